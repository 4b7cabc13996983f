//! Lookups of dispatcher-exposed state on a request.

use std::sync::Arc;

use chrono::FixedOffset;
use http::Uri;
use parking_lot::Mutex;
use tracing::trace;

use super::flash::{FlashMap, FlashMapManager};
use super::locale::{LocaleContext, LocaleResolver};
use super::request::{WebRequest, WebResponse};
use super::theme::{Theme, ThemeResolver, ThemeSource};
use super::{
    FLASH_MAP_MANAGER_ATTRIBUTE, INPUT_FLASH_MAP_ATTRIBUTE, LOCALE_CONTEXT_ATTRIBUTE, LOCALE_RESOLVER_ATTRIBUTE,
    OUTPUT_FLASH_MAP_ATTRIBUTE, THEME_ATTRIBUTE, THEME_RESOLVER_ATTRIBUTE, THEME_SOURCE_ATTRIBUTE,
    WEB_APPLICATION_CONTEXT_ATTRIBUTE,
};
use crate::context::ApplicationContext;
use crate::locale::Locale;

pub fn application_context(request: &WebRequest) -> Option<Arc<ApplicationContext>> {
    request
        .attribute_as::<Arc<ApplicationContext>>(WEB_APPLICATION_CONTEXT_ATTRIBUTE)
        .map(|c| c.as_ref().clone())
}

pub fn locale_resolver(request: &WebRequest) -> Option<Arc<dyn LocaleResolver>> {
    request
        .attribute_as::<Arc<dyn LocaleResolver>>(LOCALE_RESOLVER_ATTRIBUTE)
        .map(|r| r.as_ref().clone())
}

fn locale_context(request: &WebRequest) -> Option<LocaleContext> {
    request
        .attribute_as::<LocaleContext>(LOCALE_CONTEXT_ATTRIBUTE)
        .map(|c| c.as_ref().clone())
}

/// The resolved locale, else the locale resolver's answer, else the default.
pub fn locale(request: &WebRequest) -> Locale {
    if let Some(locale) = locale_context(request).and_then(|c| c.locale) {
        return locale;
    }
    locale_resolver(request)
        .map(|r| r.resolve_locale(request))
        .unwrap_or_default()
}

pub fn time_zone(request: &WebRequest) -> Option<FixedOffset> {
    locale_context(request).and_then(|c| c.time_zone)
}

pub fn theme_resolver(request: &WebRequest) -> Option<Arc<dyn ThemeResolver>> {
    request
        .attribute_as::<Arc<dyn ThemeResolver>>(THEME_RESOLVER_ATTRIBUTE)
        .map(|r| r.as_ref().clone())
}

pub fn theme_source(request: &WebRequest) -> Option<Arc<dyn ThemeSource>> {
    request
        .attribute_as::<Arc<dyn ThemeSource>>(THEME_SOURCE_ATTRIBUTE)
        .map(|s| s.as_ref().clone())
}

pub fn theme(request: &WebRequest) -> Option<Arc<Theme>> {
    request.attribute_as::<Theme>(THEME_ATTRIBUTE)
}

pub fn flash_map_manager(request: &WebRequest) -> Option<Arc<dyn FlashMapManager>> {
    request
        .attribute_as::<Arc<dyn FlashMapManager>>(FLASH_MAP_MANAGER_ATTRIBUTE)
        .map(|m| m.as_ref().clone())
}

/// Flash attributes saved by a previous request for this one.
pub fn input_flash_map(request: &WebRequest) -> Option<Arc<FlashMap>> {
    request.attribute_as::<FlashMap>(INPUT_FLASH_MAP_ATTRIBUTE)
}

/// Flash attributes to save for the next request.
pub fn output_flash_map(request: &WebRequest) -> Option<Arc<Mutex<FlashMap>>> {
    request.attribute_as::<Mutex<FlashMap>>(OUTPUT_FLASH_MAP_ATTRIBUTE)
}

/// Targets the output flash map at the path and query of `location` and hands
/// it to the flash map manager. Does nothing when either is missing or the map
/// is empty.
pub fn save_output_flash_map(location: &str, request: &mut WebRequest, response: &mut WebResponse) {
    let Some(output) = output_flash_map(request) else {
        return;
    };
    let flash_map = {
        let mut output = output.lock();
        if output.is_empty() {
            return;
        }
        let location = location.split('#').next().unwrap_or(location);
        let (path, query) = match location.parse::<Uri>() {
            Ok(uri) if uri.scheme().is_some() => (uri.path().to_string(), uri.query().map(str::to_string)),
            _ => match location.split_once('?') {
                Some((path, query)) => (path.to_string(), Some(query.to_string())),
                None => (location.to_string(), None),
            },
        };
        if output.target_request_path().is_none() && !path.is_empty() {
            output.set_target_request_path(path);
        }
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                let value = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                output.add_target_request_param(name, value);
            }
        }
        std::mem::take(&mut *output)
    };
    match flash_map_manager(request) {
        Some(manager) => manager.save_output_flash_map(flash_map, request, response),
        None => trace!("no flash map manager, dropping output flash map"),
    }
}
