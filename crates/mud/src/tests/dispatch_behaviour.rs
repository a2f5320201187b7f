//! Behavioural tests for request dispatch against a real store.

use std::cell::RefCell;
use std::fs;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use mu_store::Store;

use crate::context::{PersistentContext, RequestContext};
use crate::dispatch::handle_request;
use crate::response::ResponseChannel;

use super::support::MaildirFixture;

struct DispatchWorld {
    maildir: MaildirFixture,
    context: PersistentContext,
    completions: Vec<Vec<String>>,
    notifications: Vec<String>,
    terminate: bool,
}

impl DispatchWorld {
    fn new() -> Self {
        Self {
            maildir: MaildirFixture::new(),
            context: PersistentContext::new(Store::new()),
            completions: Vec::new(),
            notifications: Vec::new(),
            terminate: false,
        }
    }

    fn send(&mut self, request: &str) {
        let completions = RefCell::new(Vec::new());
        let notifications = RefCell::new(Vec::new());
        let terminate = {
            let channel = ResponseChannel::new(
                |fragments| completions.borrow_mut().push(fragments),
                |payload| notifications.borrow_mut().push(payload),
            );
            let mut ctx = RequestContext::new(&self.context, channel);
            handle_request(&mut ctx, request);
            ctx.terminate_requested()
        };
        self.completions = completions.into_inner();
        self.notifications = notifications.into_inner();
        self.terminate = terminate;
    }

    fn reply(&self) -> &[String] {
        match self.completions.as_slice() {
            [reply] => reply,
            other => panic!("expected exactly one reply, got {other:?}"),
        }
    }
}

#[fixture]
fn world() -> RefCell<DispatchWorld> {
    RefCell::new(DispatchWorld::new())
}

#[given("an empty store")]
fn given_empty_store(world: &RefCell<DispatchWorld>) {
    let _ = world;
}

#[given("a store holding {count} messages about \"{subject}\"")]
fn given_messages(world: &RefCell<DispatchWorld>, count: usize, subject: String) {
    let world = world.borrow();
    for index in 0..count {
        let path = world
            .maildir
            .write_message(&format!("inbox/cur/{index}:2,S"), &format!("{subject} {index}"));
        world.context.store().add(&path).expect("add message");
    }
}

#[given("message {index} has vanished from disk")]
fn given_vanished(world: &RefCell<DispatchWorld>, index: usize) {
    let world = world.borrow();
    fs::remove_file(world.maildir.path().join(format!("inbox/cur/{index}:2,S")))
        .expect("remove message file");
}

#[given("an unindexed message file about \"{subject}\"")]
fn given_unindexed(world: &RefCell<DispatchWorld>, subject: String) {
    world
        .borrow()
        .maildir
        .write_message("archive/new/fresh", &subject);
}

#[when("the client sends '{request}'")]
fn when_client_sends(world: &RefCell<DispatchWorld>, request: String) {
    world.borrow_mut().send(&request);
}

#[when("the client adds the unindexed message")]
fn when_client_adds(world: &RefCell<DispatchWorld>) {
    let path = world.borrow().maildir.path().join("archive/new/fresh");
    let request = format!("(add :path {})", mu_sexp::escape(&path.display().to_string()));
    world.borrow_mut().send(&request);
}

#[when("the client indexes the maildir")]
fn when_client_indexes(world: &RefCell<DispatchWorld>) {
    let path = world.borrow().maildir.path().display().to_string();
    let request = format!("(index :path {})", mu_sexp::escape(&path));
    world.borrow_mut().send(&request);
}

#[then("exactly one reply is sent")]
fn then_one_reply(world: &RefCell<DispatchWorld>) {
    assert_eq!(world.borrow().completions.len(), 1);
}

#[then("the reply has {count} fragments")]
fn then_fragment_count(world: &RefCell<DispatchWorld>, count: usize) {
    let world = world.borrow();
    assert_eq!(world.reply().len(), count, "reply: {:?}", world.reply());
}

#[then("the reply starts with '{fragment}'")]
fn then_reply_starts(world: &RefCell<DispatchWorld>, fragment: String) {
    let world = world.borrow();
    assert_eq!(world.reply().first(), Some(&fragment));
}

#[then("the reply ends with '{fragment}'")]
fn then_reply_ends(world: &RefCell<DispatchWorld>, fragment: String) {
    let world = world.borrow();
    assert_eq!(world.reply().last(), Some(&fragment));
}

#[then("every match fragment mentions \"{subject}\"")]
fn then_matches_mention(world: &RefCell<DispatchWorld>, subject: String) {
    let world = world.borrow();
    let reply = world.reply();
    let matches = reply
        .get(1..reply.len().saturating_sub(1))
        .unwrap_or_default();
    assert!(!matches.is_empty(), "no match fragments in {reply:?}");
    for fragment in matches {
        assert!(fragment.starts_with("(:docid "), "unexpected fragment {fragment}");
        assert!(fragment.contains(&subject), "unexpected fragment {fragment}");
    }
}

#[then("the reply is a single error with code {code}")]
fn then_single_error(world: &RefCell<DispatchWorld>, code: u32) {
    let world = world.borrow();
    let [fragment] = world.reply() else {
        panic!("expected one fragment, got {:?}", world.reply());
    };
    let prefix = format!("(:error {code} :message ");
    assert!(fragment.starts_with(&prefix), "unexpected fragment {fragment}");
}

#[then("{count} progress notifications were emitted")]
fn then_progress(world: &RefCell<DispatchWorld>, count: usize) {
    let world = world.borrow();
    assert_eq!(world.notifications.len(), count, "{:?}", world.notifications);
    for notification in &world.notifications {
        assert!(
            notification.starts_with("(:info index :status running"),
            "unexpected notification {notification}"
        );
    }
}

#[then("the request asked the server to stop")]
fn then_terminate(world: &RefCell<DispatchWorld>) {
    let world = world.borrow();
    assert!(world.terminate);
    assert!(world.reply().is_empty());
}

#[then("the store holds {count} messages")]
fn then_store_count(world: &RefCell<DispatchWorld>, count: usize) {
    let stored = world.borrow().context.store().count().expect("count");
    assert_eq!(stored, count);
}

#[scenario(path = "tests/features/request_dispatch.feature")]
fn request_dispatch(world: RefCell<DispatchWorld>) {
    let _ = world;
}
