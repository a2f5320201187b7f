//! Behavioural tests for the server bootstrap sequence.

use std::cell::RefCell;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::bootstrap::{BootstrapError, ConfigLoader, Server, bootstrap_with};

use super::support::{
    FailingConfigLoader, HealthEvent, MaildirFixture, RecordingHealthReporter, TestConfigLoader,
};

struct BootstrapWorld {
    loader: Box<dyn ConfigLoader>,
    reporter: Arc<RecordingHealthReporter>,
    maildir: Option<MaildirFixture>,
    server: Option<Server>,
    error: Option<BootstrapError>,
}

impl BootstrapWorld {
    fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            maildir: None,
            server: None,
            error: None,
        }
    }

    fn bootstrap(&mut self) {
        match bootstrap_with(&*self.loader, self.reporter.clone()) {
            Ok(server) => self.server = Some(server),
            Err(error) => self.error = Some(error),
        }
    }

    fn server(&self) -> &Server {
        self.server
            .as_ref()
            .unwrap_or_else(|| panic!("bootstrap failed: {:?}", self.error))
    }
}

#[fixture]
fn world() -> RefCell<BootstrapWorld> {
    RefCell::new(BootstrapWorld::new())
}

#[given("a healthy configuration loader")]
fn given_healthy_loader(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().loader = Box::new(TestConfigLoader::new());
}

#[given("a failing configuration loader")]
fn given_failing_loader(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().loader = Box::new(FailingConfigLoader);
}

#[given("a configured maildir holding {count} messages")]
fn given_maildir(world: &RefCell<BootstrapWorld>, count: usize) {
    let maildir = MaildirFixture::new();
    for index in 0..count {
        maildir.write_message(&format!("inbox/cur/{index}:2,S"), &format!("message {index}"));
    }
    let mut world = world.borrow_mut();
    world.loader = Box::new(TestConfigLoader::new().with_maildir(maildir.utf8_path()));
    world.maildir = Some(maildir);
}

#[given("a configured maildir that does not exist")]
fn given_missing_maildir(world: &RefCell<BootstrapWorld>) {
    let maildir = MaildirFixture::new();
    let missing = maildir.utf8_path().join("missing");
    let mut world = world.borrow_mut();
    world.loader = Box::new(TestConfigLoader::new().with_maildir(missing));
    world.maildir = Some(maildir);
}

#[when("the server bootstrap runs")]
fn when_bootstrap_runs(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().bootstrap();
}

#[then("bootstrap succeeds")]
fn then_bootstrap_succeeds(world: &RefCell<BootstrapWorld>) {
    let world = world.borrow();
    assert!(world.error.is_none(), "bootstrap error: {:?}", world.error);
    assert!(world.server.is_some(), "server should have been initialised");
}

#[then("bootstrap fails")]
fn then_bootstrap_fails(world: &RefCell<BootstrapWorld>) {
    assert!(
        world.borrow().error.is_some(),
        "bootstrap succeeded unexpectedly"
    );
}

#[then("the bootstrapped store holds {count} messages")]
fn then_store_count(world: &RefCell<BootstrapWorld>, count: usize) {
    let world = world.borrow();
    let stored = world
        .server()
        .context()
        .store()
        .count()
        .expect("count messages");
    assert_eq!(stored, count);
}

#[then("the reporter recorded bootstrap start")]
fn then_reporter_start(world: &RefCell<BootstrapWorld>) {
    assert!(
        world
            .borrow()
            .reporter
            .events()
            .contains(&HealthEvent::BootstrapStarting),
        "bootstrap start event missing"
    );
}

#[then("the reporter recorded bootstrap success")]
fn then_reporter_success(world: &RefCell<BootstrapWorld>) {
    assert!(
        world
            .borrow()
            .reporter
            .events()
            .contains(&HealthEvent::BootstrapSucceeded),
        "bootstrap success event missing"
    );
}

#[then("the reporter recorded bootstrap failure")]
fn then_reporter_failure(world: &RefCell<BootstrapWorld>) {
    let events = world.borrow().reporter.events();
    let failed = events
        .iter()
        .any(|event| matches!(event, HealthEvent::BootstrapFailed(_)));
    assert!(failed, "bootstrap failure event missing: {events:?}");
}

#[scenario(path = "tests/features/server_bootstrap.feature")]
fn server_bootstrap(world: RefCell<BootstrapWorld>) {
    let _ = world;
}
