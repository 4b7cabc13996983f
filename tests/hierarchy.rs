//! Parent/child context tests

use ferrous_context::{
    ApplicationContext, BeanDefinition, BeanFactory, BeanFactoryExt, ContextError, ContextStatus, Locale,
    MessageSource, StaticMessageSource, MESSAGE_SOURCE_BEAN_NAME,
};
use std::sync::Arc;

struct Repository {
    url: String,
}

struct Service {
    repository: Arc<Repository>,
}

fn parent() -> Arc<ApplicationContext> {
    let messages = StaticMessageSource::new();
    messages.add_message("title", None, "Parent title");
    messages.add_message("footer", None, "Parent footer {0}");

    ApplicationContext::builder()
        .display_name("parent")
        .singleton("repository", Repository { url: "db://parent".into() })
        .singleton(MESSAGE_SOURCE_BEAN_NAME, messages)
        .build()
        .unwrap()
}

#[test]
fn test_child_resolves_parent_beans() {
    let parent = parent();
    let child = ApplicationContext::builder()
        .parent(parent.clone())
        .bean(
            BeanDefinition::builder::<Service>("service")
                .constructor(&["repository"], |args| {
                    Ok(Service {
                        repository: args.get::<Repository>(0)?,
                    })
                })
                .build(),
        )
        .build()
        .unwrap();

    let service = child.get_bean_as::<Service>("service").unwrap();
    let repository = parent.get_bean_as::<Repository>("repository").unwrap();
    assert!(Arc::ptr_eq(&service.repository, &repository));
    assert_eq!(service.repository.url, "db://parent");

    assert!(child.contains_bean("repository"));
    assert!(!child.contains_local_bean("repository"));
    assert!(child.is_singleton("repository").unwrap());
    assert!(!parent.contains_bean("service"));
}

#[test]
fn test_child_definition_shadows_parent() {
    let parent = parent();
    let child = ApplicationContext::builder()
        .parent(parent.clone())
        .singleton("repository", Repository { url: "db://child".into() })
        .build()
        .unwrap();

    assert_eq!(child.get_bean_as::<Repository>("repository").unwrap().url, "db://child");
    assert_eq!(parent.get_bean_as::<Repository>("repository").unwrap().url, "db://parent");
}

#[test]
fn test_missing_bean_reports_name() {
    let child = ApplicationContext::builder().parent(parent()).build().unwrap();
    match child.get_bean("nowhere") {
        Err(ContextError::NoSuchBean(name)) => assert_eq!(name, "nowhere"),
        other => panic!("expected no such bean, got {:?}", other.map(|_| ())),
    }
    assert!(child.is_prototype("nowhere").is_err());
}

#[test]
fn test_messages_fall_back_to_parent() {
    let messages = StaticMessageSource::new();
    messages.add_message("title", None, "Child title");
    messages.add_message("title", Some(&Locale::new("de", None)), "Kindtitel");

    let child = ApplicationContext::builder()
        .parent(parent())
        .singleton(MESSAGE_SOURCE_BEAN_NAME, messages)
        .build()
        .unwrap();

    let en = Locale::english();
    assert_eq!(child.get_message("title", &[], &en).as_deref(), Some("Child title"));
    assert_eq!(
        child.get_message("title", &[], &Locale::new("de", Some("AT"))).as_deref(),
        Some("Kindtitel")
    );
    assert_eq!(
        child.get_message("footer", &["2024"], &en).as_deref(),
        Some("Parent footer 2024")
    );
    assert_eq!(child.get_message("absent", &[], &en), None);
    assert_eq!(child.get_message_or("absent", &["x"], "Default {0}", &en), "Default x");
    assert!(matches!(
        child.require_message("absent", &[], &en),
        Err(ContextError::NoSuchMessage { .. })
    ));
}

#[test]
fn test_closing_child_leaves_parent_active() {
    let parent = parent();
    let child = ApplicationContext::builder().parent(parent.clone()).build().unwrap();

    child.close();
    assert_eq!(child.status(), ContextStatus::Closed);
    assert!(parent.is_active());
    assert!(parent.get_bean("repository").is_ok());
    assert!(child.get_bean("repository").is_err());
    assert!(child.startup_date().is_some());
}
