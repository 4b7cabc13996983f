//! Post-processor chain behavior

use ferrous_context::{
    ApplicationContext, BeanDefinition, BeanFactory, BeanFactoryExt, BeanPostProcessor, BeanRef, ContextError,
    ContextResult, Phase, HIGHEST_PRECEDENCE,
};
use parking_lot::Mutex;
use std::sync::Arc;

// ===== Test Processors =====

type Journal = Arc<Mutex<Vec<String>>>;

struct Named {
    label: &'static str,
    order: i32,
    journal: Journal,
}

impl BeanPostProcessor for Named {
    fn name(&self) -> &str {
        self.label
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn before_initialization(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        self.journal.lock().push(format!("{}:before:{name}", self.label));
        Ok(bean)
    }

    fn after_initialization(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        self.journal.lock().push(format!("{}:after:{name}", self.label));
        Ok(bean)
    }
}

struct ShortCircuit;

struct Replacement(&'static str);

impl BeanPostProcessor for ShortCircuit {
    fn before_instantiation(&self, definition: &BeanDefinition) -> ContextResult<Option<BeanRef>> {
        if definition.name() == "replaced" {
            return Ok(Some(Arc::new(Replacement("from processor"))));
        }
        Ok(None)
    }
}

struct Veto;

impl BeanPostProcessor for Veto {
    fn after_instantiation(&self, _bean: &BeanRef, name: &str) -> ContextResult<bool> {
        Ok(name != "vetoed")
    }
}

struct Failing;

impl BeanPostProcessor for Failing {
    fn before_initialization(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        if name == "doomed" {
            return Err(ContextError::BeanCreation("rejected by processor".into()));
        }
        Ok(bean)
    }
}

struct PreferSecond;

impl BeanPostProcessor for PreferSecond {
    fn determine_candidate_constructors(&self, definition: &BeanDefinition) -> Option<Vec<String>> {
        (definition.name() == "flexible").then(|| vec!["missing".into(), "available".into()])
    }
}

#[derive(Default)]
struct Holder {
    value: Mutex<Option<Arc<u32>>>,
}

// ===== Tests =====

#[test]
fn test_processors_run_by_order_then_registration() {
    struct Plain;
    let journal: Journal = Arc::default();
    let processor = |label, order| -> Arc<dyn BeanPostProcessor> {
        Arc::new(Named {
            label,
            order,
            journal: journal.clone(),
        })
    };

    let ctx = ApplicationContext::builder()
        .post_processor(processor("late", 10))
        .post_processor(processor("early", HIGHEST_PRECEDENCE))
        .post_processor(processor("also_late", 10))
        .bean(BeanDefinition::builder::<Plain>("plain").supplier(|| Plain).build())
        .build()
        .unwrap();

    assert_eq!(ctx.post_processors().names(), vec!["early", "late", "also_late"]);
    assert_eq!(
        *journal.lock(),
        vec![
            "early:before:plain",
            "late:before:plain",
            "also_late:before:plain",
            "early:after:plain",
            "late:after:plain",
            "also_late:after:plain",
        ]
    );
}

#[test]
fn test_before_instantiation_short_circuits_construction() {
    let journal: Journal = Arc::default();
    let constructed = Arc::new(Mutex::new(false));

    let ctx = ApplicationContext::builder()
        .post_processor(Arc::new(ShortCircuit))
        .post_processor(Arc::new(Named {
            label: "observer",
            order: 0,
            journal: journal.clone(),
        }))
        .bean(
            BeanDefinition::builder::<Replacement>("replaced")
                .supplier({
                    let constructed = constructed.clone();
                    move || {
                        *constructed.lock() = true;
                        Replacement("from supplier")
                    }
                })
                .init_method(|_| Err(ContextError::BeanCreation("init must not run".into())))
                .build(),
        )
        .build()
        .unwrap();

    let bean = ctx.get_bean_as::<Replacement>("replaced").unwrap();
    assert_eq!(bean.0, "from processor");
    assert!(!*constructed.lock());
    // Only the after-initialization hook sees a short-circuited bean
    assert_eq!(*journal.lock(), vec!["observer:after:replaced"]);
}

#[test]
fn test_after_instantiation_false_skips_population() {
    let holder = |name: &str| {
        BeanDefinition::builder::<Holder>(name)
            .supplier(Holder::default)
            .typed_property::<u32, _>("value", "number", |holder, value| {
                *holder.value.lock() = Some(value);
                Ok(())
            })
            .build()
    };

    let ctx = ApplicationContext::builder()
        .post_processor(Arc::new(Veto))
        .singleton("number", 7u32)
        .bean(holder("vetoed"))
        .bean(holder("populated"))
        .build()
        .unwrap();

    assert!(ctx.get_bean_as::<Holder>("vetoed").unwrap().value.lock().is_none());
    assert_eq!(
        ctx.get_bean_as::<Holder>("populated").unwrap().value.lock().as_deref(),
        Some(&7)
    );
}

#[test]
fn test_processor_failure_is_wrapped_with_phase() {
    struct Doomed;

    let err = ApplicationContext::builder()
        .post_processor(Arc::new(Failing))
        .bean(BeanDefinition::builder::<Doomed>("doomed").supplier(|| Doomed).build())
        .build()
        .unwrap_err();

    assert_eq!(err.bean_name(), Some("doomed"));
    assert_eq!(err.phase(), Some(Phase::PostProcessing));
    assert_eq!(err.root_cause().kind(), "bean_creation");
}

#[test]
fn test_candidate_constructors_fall_through_unsatisfied() {
    struct Flexible(&'static str);

    let ctx = ApplicationContext::builder()
        .post_processor(Arc::new(PreferSecond))
        .singleton("number", 1u32)
        .bean(
            BeanDefinition::builder::<Flexible>("flexible")
                .named_constructor("missing", &["nowhere"], |_| Ok(Flexible("missing")))
                .named_constructor("available", &["number"], |_| Ok(Flexible("available")))
                .build(),
        )
        .build()
        .unwrap();

    assert_eq!(ctx.get_bean_as::<Flexible>("flexible").unwrap().0, "available");
}

#[test]
fn test_empty_chain_leaves_beans_untouched() {
    let ctx = ApplicationContext::builder().singleton("n", 3u8).build().unwrap();
    assert_eq!(ctx.post_processors().names(), vec!["IdentityPostProcessor"]);
    assert_eq!(*ctx.get_bean_as::<u8>("n").unwrap(), 3);
    assert!(ctx.contains_bean("n"));
}
