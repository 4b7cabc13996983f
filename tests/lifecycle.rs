//! Bean lifecycle ordering tests

use ferrous_context::{
    ApplicationContext, BeanDefinition, BeanFactoryExt, BeanNameAware, BeanPostProcessor, BeanRef, ContextBinder,
    ContextError, ContextResult, ContextSupport, DisposableBean, Environment, EnvironmentAware, InitializingBean,
    LifecycleObserver, LifecycleState, MapPropertySource, Phase,
};
use parking_lot::Mutex;
use std::sync::Arc;

// ===== Test Services =====

type Journal = Arc<Mutex<Vec<String>>>;

struct Tracked {
    journal: Journal,
    binder: ContextBinder,
    name: Mutex<Option<String>>,
}

impl Tracked {
    fn new(journal: Journal) -> Self {
        Self {
            journal,
            binder: ContextBinder::new(),
            name: Mutex::new(None),
        }
    }

    fn log(&self, entry: &str) {
        self.journal.lock().push(entry.to_string());
    }
}

impl BeanNameAware for Tracked {
    fn set_bean_name(&self, name: &str) {
        *self.name.lock() = Some(name.to_string());
        self.log("name");
    }
}

impl ContextSupport for Tracked {
    fn binder(&self) -> &ContextBinder {
        &self.binder
    }

    fn init_application_context(&self, _context: &Arc<ApplicationContext>) -> ContextResult<()> {
        self.log("context");
        Ok(())
    }
}

impl EnvironmentAware for Tracked {
    fn set_environment(&self, environment: Arc<Environment>) {
        let greeting = environment.get_string_or("greeting", "none");
        self.log(&format!("environment:{greeting}"));
    }
}

impl InitializingBean for Tracked {
    fn after_properties_set(&self) -> ContextResult<()> {
        self.log("after_properties_set");
        Ok(())
    }
}

impl DisposableBean for Tracked {
    fn destroy(&self) -> ContextResult<()> {
        self.log("destroy");
        Ok(())
    }
}

struct JournalProcessor(Journal);

impl BeanPostProcessor for JournalProcessor {
    fn before_initialization(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        self.0.lock().push(format!("before_init:{name}"));
        Ok(bean)
    }

    fn after_initialization(&self, bean: BeanRef, name: &str) -> ContextResult<BeanRef> {
        self.0.lock().push(format!("after_init:{name}"));
        Ok(bean)
    }
}

#[derive(Default)]
struct StateRecorder(Mutex<Vec<(String, LifecycleState)>>);

impl StateRecorder {
    fn states_of(&self, bean: &str) -> Vec<LifecycleState> {
        self.0
            .lock()
            .iter()
            .filter(|(name, _)| name == bean)
            .map(|(_, state)| *state)
            .collect()
    }
}

impl LifecycleObserver for StateRecorder {
    fn state_changed(&self, bean: &str, state: LifecycleState) {
        self.0.lock().push((bean.to_string(), state));
    }
}

fn tracked(name: &str, journal: &Journal) -> BeanDefinition {
    let journal = journal.clone();
    BeanDefinition::builder::<Tracked>(name)
        .supplier(move || Tracked::new(journal.clone()))
        .name_aware()
        .context_aware()
        .environment_aware()
        .initializing()
        .init_method(|bean| {
            bean.log("init_method");
            Ok(())
        })
        .disposable()
        .destroy_method(|bean| {
            bean.log("destroy_method");
            Ok(())
        })
        .build()
}

// ===== Tests =====

#[test]
fn test_callbacks_run_in_lifecycle_order() {
    let journal: Journal = Arc::default();
    let ctx = ApplicationContext::builder()
        .property_source(Arc::new(MapPropertySource::new("test").with("greeting", "hello")))
        .post_processor(Arc::new(JournalProcessor(journal.clone())))
        .bean(tracked("tracked", &journal))
        .build()
        .unwrap();

    assert_eq!(
        *journal.lock(),
        vec![
            "name",
            "context",
            "environment:hello",
            "before_init:tracked",
            "after_properties_set",
            "init_method",
            "after_init:tracked",
        ]
    );

    let bean = ctx.get_bean_as::<Tracked>("tracked").unwrap();
    assert_eq!(bean.name.lock().as_deref(), Some("tracked"));
    assert!(bean.binder().is_bound());

    journal.lock().clear();
    ctx.close();
    assert_eq!(*journal.lock(), vec!["destroy", "destroy_method"]);
}

#[test]
fn test_destroy_runs_in_reverse_creation_order() {
    let journal: Journal = Arc::default();
    let ctx = ApplicationContext::builder()
        .bean(tracked("first", &journal))
        .bean(
            BeanDefinition::builder::<Tracked>("second")
                .supplier({
                    let journal = journal.clone();
                    move || Tracked::new(journal.clone())
                })
                .depends_on("third")
                .destroy_method(|bean| {
                    bean.log("destroy:second");
                    Ok(())
                })
                .build(),
        )
        .bean(
            BeanDefinition::builder::<Tracked>("third")
                .supplier({
                    let journal = journal.clone();
                    move || Tracked::new(journal.clone())
                })
                .destroy_method(|bean| {
                    bean.log("destroy:third");
                    Ok(())
                })
                .build(),
        )
        .build()
        .unwrap();

    assert_eq!(ctx.singleton_names(), vec!["first", "third", "second"]);

    journal.lock().clear();
    ctx.close();
    assert_eq!(
        *journal.lock(),
        vec!["destroy:second", "destroy:third", "destroy", "destroy_method"]
    );

    // Closing twice does nothing
    ctx.close();
    assert_eq!(journal.lock().len(), 4);
}

#[test]
fn test_observer_sees_states_in_order() {
    #[derive(Default)]
    struct Node {
        peer: Mutex<Option<std::sync::Weak<Node>>>,
    }

    let node = |name: &str, peer: &str| {
        BeanDefinition::builder::<Node>(name)
            .supplier(Node::default)
            .typed_property::<Node, _>("peer", peer, |node, peer| {
                *node.peer.lock() = Some(Arc::downgrade(&peer));
                Ok(())
            })
            .build()
    };

    let recorder = Arc::new(StateRecorder::default());
    let _ctx = ApplicationContext::builder()
        .observer(recorder.clone())
        .bean(node("a", "b"))
        .bean(node("b", "a"))
        .build()
        .unwrap();

    assert_eq!(
        recorder.states_of("a"),
        vec![
            LifecycleState::Raw,
            LifecycleState::EarlyExposed,
            LifecycleState::Populated,
            LifecycleState::AwareNotified,
            LifecycleState::Initialized,
        ]
    );
    assert_eq!(
        recorder.states_of("b"),
        vec![
            LifecycleState::Raw,
            LifecycleState::Populated,
            LifecycleState::AwareNotified,
            LifecycleState::Initialized,
        ]
    );
    for bean in ["a", "b"] {
        let states = recorder.states_of(bean);
        assert!(states.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_init_failure_reports_phase() {
    struct Fragile;

    let err = ApplicationContext::builder()
        .bean(
            BeanDefinition::builder::<Fragile>("fragile")
                .supplier(|| Fragile)
                .init_method(|_| Err(ContextError::BeanCreation("boom".into())))
                .build(),
        )
        .build()
        .unwrap_err();

    assert_eq!(err.bean_name(), Some("fragile"));
    assert_eq!(err.phase(), Some(Phase::Initialization));
    assert!(matches!(err.root_cause(), ContextError::BeanCreation(msg) if msg == "boom"));
}

#[test]
fn test_failed_refresh_destroys_created_singletons() {
    struct Fragile;
    let journal: Journal = Arc::default();

    let ctx = ApplicationContext::builder()
        .bean(tracked("healthy", &journal))
        .bean(
            BeanDefinition::builder::<Fragile>("fragile")
                .supplier(|| Fragile)
                .init_method(|_| Err(ContextError::BeanCreation("boom".into())))
                .build(),
        )
        .prepare()
        .unwrap();

    assert!(ctx.refresh().is_err());
    assert!(journal.lock().ends_with(&["destroy".to_string(), "destroy_method".to_string()]));
    assert!(ctx.singleton_names().is_empty());
}

#[test]
fn test_lazy_singleton_created_on_first_lookup() {
    struct Lazy;
    let recorder = Arc::new(StateRecorder::default());

    let ctx = ApplicationContext::builder()
        .observer(recorder.clone())
        .bean(BeanDefinition::builder::<Lazy>("lazy").supplier(|| Lazy).lazy().build())
        .build()
        .unwrap();

    assert!(recorder.states_of("lazy").is_empty());
    let first = ctx.get_bean_as::<Lazy>("lazy").unwrap();
    let second = ctx.get_bean_as::<Lazy>("lazy").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(recorder.states_of("lazy").last(), Some(&LifecycleState::Initialized));
}

#[test]
fn test_prototype_gets_fresh_instance_and_no_destroy() {
    let journal: Journal = Arc::default();
    let ctx = ApplicationContext::builder()
        .bean(
            BeanDefinition::builder::<Tracked>("proto")
                .prototype()
                .supplier({
                    let journal = journal.clone();
                    move || Tracked::new(journal.clone())
                })
                .disposable()
                .build(),
        )
        .build()
        .unwrap();

    let a = ctx.get_bean_as::<Tracked>("proto").unwrap();
    let b = ctx.get_bean_as::<Tracked>("proto").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));

    ctx.close();
    assert!(journal.lock().is_empty());
}
