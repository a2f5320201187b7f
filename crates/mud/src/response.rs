//! Reply accumulation for one call.
//!
//! Handlers append reply fragments to a [`ResponseChannel`]; the dispatcher
//! sends them as one reply when the request is finished. Out-of-band
//! messages such as index progress bypass the buffer and reach the client
//! immediately. What "send" and "notify" mean is decided by the two
//! functions the channel is built with, so the same handlers serve both the
//! bus and the framed stdio stream.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};

use mu_sexp::{Sexp, compose_error};
use mu_store::{ErrorCode, MessageIterator};
use thiserror::Error;
use tracing::warn;

use crate::bus::{Bus, CallHandle};

const RESPONSE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::response");

/// First byte of a stdio frame.
pub const FRAME_START: u8 = 0xfe;

/// Byte separating the hex length from the payload of a stdio frame.
pub const FRAME_END: u8 = 0xff;

/// Misuse of a [`ResponseChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The reply was already sent.
    #[error("the response for this call was already sent")]
    AlreadyCompleted,
}

type CompleteFn<'a> = Box<dyn FnMut(Vec<String>) + 'a>;
type NotifyFn<'a> = Box<dyn FnMut(String) + 'a>;

/// Buffered reply for one call plus an out-of-band side channel.
pub struct ResponseChannel<'a> {
    fragments: Option<Vec<String>>,
    complete: CompleteFn<'a>,
    notify: NotifyFn<'a>,
}

impl<'a> ResponseChannel<'a> {
    /// Builds a channel from its two delivery functions.
    ///
    /// `complete` receives the buffered fragments exactly once. `notify`
    /// receives each out-of-band message as it is emitted.
    pub fn new(
        complete: impl FnMut(Vec<String>) + 'a,
        notify: impl FnMut(String) + 'a,
    ) -> Self {
        Self {
            fragments: Some(Vec::new()),
            complete: Box::new(complete),
            notify: Box::new(notify),
        }
    }

    /// A channel answering `call` on `bus`. Fragments are joined with
    /// newlines into the reply text.
    pub fn for_call<B: Bus + ?Sized>(bus: &'a B, call: CallHandle) -> Self {
        Self::new(
            move |fragments| bus.complete_call(call, fragments.join("\n")),
            move |payload| bus.emit_notification(payload),
        )
    }

    /// A channel writing every fragment and notification as its own frame.
    pub fn framed<W: Write>(writer: &'a RefCell<W>) -> Self {
        Self::new(
            move |fragments| {
                let mut out = writer.borrow_mut();
                for fragment in &fragments {
                    if let Err(error) = write_frame(&mut *out, fragment) {
                        warn!(target: RESPONSE_TARGET, %error, "failed to write reply frame");
                        return;
                    }
                }
            },
            move |payload| {
                if let Err(error) = write_frame(&mut *writer.borrow_mut(), &payload) {
                    warn!(target: RESPONSE_TARGET, %error, "failed to write notification frame");
                }
            },
        )
    }

    /// A channel that drops everything.
    #[cfg(test)]
    pub(crate) fn discard() -> Self {
        Self::new(|_| {}, |_| {})
    }

    /// Appends one fragment to the pending reply.
    ///
    /// Appending after the reply was sent is logged and ignored.
    pub fn append_reply(&mut self, fragment: &Sexp) {
        match self.fragments.as_mut() {
            Some(fragments) => fragments.push(fragment.to_string()),
            None => warn!(
                target: RESPONSE_TARGET,
                %fragment,
                "reply fragment appended after the response was sent"
            ),
        }
    }

    /// Sends `message` to the client now, outside the pending reply.
    pub fn emit_out_of_band(&mut self, message: &Sexp) {
        (self.notify)(message.to_string());
    }

    /// Appends an error fragment after whatever was already buffered and
    /// returns `code`.
    pub fn report_error(&mut self, code: ErrorCode, message: &str) -> ErrorCode {
        self.append_reply(&compose_error(code.code(), message));
        code
    }

    /// Appends headers-only fragments for readable matches.
    ///
    /// Stops when the iterator is exhausted or `max` fragments were added.
    /// Unreadable matches are skipped without counting. Every inspected item
    /// is advanced past, so the iterator rests on the first item not
    /// inspected. Returns the number of fragments added.
    pub fn drain_matches<I>(&mut self, matches: &mut I, max: usize) -> usize
    where
        I: MessageIterator + ?Sized,
    {
        let mut added = 0;
        while !matches.is_done() && added < max {
            if matches.current_is_readable()
                && let Some(fragment) = matches.serialize_headers_only()
            {
                self.append_reply(&fragment);
                added += 1;
            }
            matches.advance();
        }
        added
    }

    /// Buffered fragments not yet sent.
    #[must_use]
    pub fn pending(&self) -> &[String] {
        self.fragments.as_deref().unwrap_or_default()
    }

    /// True once the reply was sent.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.fragments.is_none()
    }

    /// Sends the buffered reply.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AlreadyCompleted`] on every call after the
    /// first.
    pub fn send_response(&mut self) -> Result<(), ChannelError> {
        let fragments = self
            .fragments
            .take()
            .ok_or(ChannelError::AlreadyCompleted)?;
        (self.complete)(fragments);
        Ok(())
    }
}

impl Drop for ResponseChannel<'_> {
    fn drop(&mut self) {
        if let Some(fragments) = self.fragments.take() {
            warn!(target: RESPONSE_TARGET, "completing a call that was never answered");
            (self.complete)(fragments);
        }
    }
}

impl fmt::Debug for ResponseChannel<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ResponseChannel")
            .field("fragments", &self.fragments)
            .finish_non_exhaustive()
    }
}

/// Writes `payload` as one stdio frame: [`FRAME_START`], the hex length of
/// the payload plus its trailing newline, [`FRAME_END`], then the payload
/// and the newline.
///
/// # Errors
///
/// Returns any error raised by `writer`.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, payload: &str) -> io::Result<()> {
    let length = payload.len() + 1;
    writer.write_all(&[FRAME_START])?;
    write!(writer, "{length:x}")?;
    writer.write_all(&[FRAME_END])?;
    writer.write_all(payload.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use rstest::rstest;

    use super::*;

    #[derive(Default)]
    struct Sink {
        completed: RefCell<Vec<Vec<String>>>,
        notified: RefCell<Vec<String>>,
    }

    impl Sink {
        fn channel(&self) -> ResponseChannel<'_> {
            ResponseChannel::new(
                |fragments| self.completed.borrow_mut().push(fragments),
                |payload| self.notified.borrow_mut().push(payload),
            )
        }
    }

    /// Iterator over labelled items, each either readable or not.
    struct Items {
        items: Vec<(&'static str, bool)>,
        position: usize,
        advanced: usize,
    }

    impl Items {
        fn new(items: &[(&'static str, bool)]) -> Self {
            Self {
                items: items.to_vec(),
                position: 0,
                advanced: 0,
            }
        }
    }

    impl MessageIterator for Items {
        fn is_done(&self) -> bool {
            self.position >= self.items.len()
        }

        fn current_is_readable(&self) -> bool {
            self.items
                .get(self.position)
                .is_some_and(|(_, readable)| *readable)
        }

        fn serialize_headers_only(&self) -> Option<Sexp> {
            self.items
                .get(self.position)
                .map(|(label, _)| Sexp::symbol(*label))
        }

        fn advance(&mut self) {
            self.position += 1;
            self.advanced += 1;
        }
    }

    #[test]
    fn send_response_delivers_fragments_once() {
        let sink = Sink::default();
        let mut channel = sink.channel();
        channel.append_reply(&Sexp::symbol("a"));
        channel.append_reply(&Sexp::symbol("b"));

        channel.send_response().expect("first send");
        assert_eq!(
            channel.send_response(),
            Err(ChannelError::AlreadyCompleted)
        );
        drop(channel);

        assert_eq!(
            *sink.completed.borrow(),
            vec![vec!["a".to_owned(), "b".to_owned()]]
        );
    }

    #[test]
    fn out_of_band_messages_bypass_the_buffer() {
        let sink = Sink::default();
        let mut channel = sink.channel();
        channel.append_reply(&Sexp::symbol("reply"));
        channel.emit_out_of_band(&Sexp::symbol("progress"));

        assert_eq!(*sink.notified.borrow(), vec!["progress".to_owned()]);
        assert_eq!(channel.pending(), ["reply".to_owned()]);
        assert!(sink.completed.borrow().is_empty());
    }

    #[test]
    fn errors_are_appended_after_earlier_fragments() {
        let sink = Sink::default();
        let mut channel = sink.channel();
        channel.append_reply(&Sexp::symbol("partial"));
        let code = channel.report_error(ErrorCode::Query, "bad \"term\"");

        assert_eq!(code, ErrorCode::Query);
        assert_eq!(
            channel.pending(),
            [
                "partial".to_owned(),
                "(:error 110 :message \"bad \\\"term\\\"\")".to_owned(),
            ]
        );
    }

    #[test]
    fn appending_after_completion_is_ignored() {
        let sink = Sink::default();
        let mut channel = sink.channel();
        channel.send_response().expect("send");
        channel.append_reply(&Sexp::symbol("late"));

        assert!(channel.is_completed());
        assert!(channel.pending().is_empty());
        assert_eq!(sink.completed.borrow().len(), 1);
    }

    #[test]
    fn dropping_an_unanswered_channel_completes_the_call() {
        let sink = Sink::default();
        let mut channel = sink.channel();
        channel.append_reply(&Sexp::symbol("orphan"));
        drop(channel);

        assert_eq!(*sink.completed.borrow(), vec![vec!["orphan".to_owned()]]);
    }

    #[rstest]
    #[case::all_readable(&[("a", true), ("b", true), ("c", true)], 10, &["a", "b", "c"], 3)]
    #[case::bounded(&[("a", true), ("b", true), ("c", true)], 2, &["a", "b"], 2)]
    #[case::skips_unreadable(&[("a", true), ("b", false), ("c", true)], 10, &["a", "c"], 3)]
    #[case::bound_ignores_skipped(&[("a", false), ("b", true), ("c", true), ("d", true)], 2, &["b", "c"], 3)]
    #[case::zero_max(&[("a", true)], 0, &[], 0)]
    #[case::empty(&[], 5, &[], 0)]
    fn drain_matches_respects_bound_and_order(
        #[case] items: &[(&'static str, bool)],
        #[case] max: usize,
        #[case] expected: &[&str],
        #[case] advanced: usize,
    ) {
        let sink = Sink::default();
        let mut channel = sink.channel();
        let mut matches = Items::new(items);

        let added = channel.drain_matches(&mut matches, max);

        assert_eq!(added, expected.len());
        assert_eq!(channel.pending(), expected);
        assert_eq!(matches.advanced, advanced);
    }

    #[test]
    fn frames_carry_the_hex_length_of_payload_and_newline() {
        let mut out = Vec::new();
        write_frame(&mut out, &"x".repeat(20)).expect("write frame");

        let mut expected = vec![FRAME_START];
        expected.extend_from_slice(b"15");
        expected.push(FRAME_END);
        expected.extend_from_slice(format!("{}\n", "x".repeat(20)).as_bytes());
        assert_eq!(out, expected);
    }

    #[test]
    fn framed_channel_writes_one_frame_per_fragment() {
        let out = RefCell::new(Vec::new());
        {
            let mut channel = ResponseChannel::framed(&out);
            channel.emit_out_of_band(&Sexp::symbol("n"));
            channel.append_reply(&Sexp::symbol("a"));
            channel.append_reply(&Sexp::symbol("b"));
            channel.send_response().expect("send");
        }

        let mut expected = Vec::new();
        for payload in ["n", "a", "b"] {
            write_frame(&mut expected, payload).expect("write frame");
        }
        assert_eq!(out.into_inner(), expected);
    }
}
