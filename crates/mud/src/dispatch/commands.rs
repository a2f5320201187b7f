//! Built-in commands.

use std::path::{Path, PathBuf};

use mu_sexp::Sexp;
use mu_store::{DocId, IndexStats, QueryOptions, SortField};
use tracing::debug;

use super::DISPATCH_TARGET;
use super::arguments::Arguments;
use super::errors::CommandError;
use super::table::CommandInfo;
use crate::context::RequestContext;

/// Name reported by `ping`.
const SERVER_NAME: &str = "mu";

/// Every built-in command.
pub(crate) const BUILTIN: &[CommandInfo] = &[
    CommandInfo {
        name: "add",
        docstring: "Add the message at :path to the store",
        handler: add,
    },
    CommandInfo {
        name: "find",
        docstring: "Send headers of messages matching :query",
        handler: find,
    },
    CommandInfo {
        name: "index",
        docstring: "Index the maildir at :path, reporting progress",
        handler: index,
    },
    CommandInfo {
        name: "ping",
        docstring: "Report the server version and message count",
        handler: ping,
    },
    CommandInfo {
        name: "quit",
        docstring: "Stop the server after replying",
        handler: quit,
    },
    CommandInfo {
        name: "remove",
        docstring: "Remove the message with :docid from the store",
        handler: remove,
    },
];

fn count(value: usize) -> Sexp {
    Sexp::number(i64::try_from(value).unwrap_or(i64::MAX))
}

fn ping(ctx: &mut RequestContext<'_>, _: &Arguments<'_>) -> Result<(), CommandError> {
    let doccount = ctx.store().count()?;
    let reply = Sexp::plist([
        ("pong", Sexp::string(SERVER_NAME)),
        (
            "props",
            Sexp::plist([
                ("version", Sexp::string(env!("CARGO_PKG_VERSION"))),
                ("doccount", count(doccount)),
            ]),
        ),
    ]);
    ctx.channel_mut().append_reply(&reply);
    Ok(())
}

fn quit(ctx: &mut RequestContext<'_>, _: &Arguments<'_>) -> Result<(), CommandError> {
    debug!(target: DISPATCH_TARGET, "quit requested");
    ctx.request_terminate();
    Ok(())
}

fn find(ctx: &mut RequestContext<'_>, args: &Arguments<'_>) -> Result<(), CommandError> {
    let expr = args.required_string(":query")?;
    let max = match args.number(":maxnum")? {
        Some(limit) if limit > 0 => usize::try_from(limit).unwrap_or(usize::MAX),
        _ => usize::MAX,
    };
    let sort = match args.symbol(":sortfield")? {
        Some(name) => name.parse::<SortField>().map_err(|_| {
            CommandError::invalid_argument(format!("unknown sort field '{name}'"))
        })?,
        None => SortField::default(),
    };
    let options = QueryOptions {
        sort,
        reverse: args.flag(":reverse"),
    };

    let mut matches = ctx.query().run(expr, &options)?;
    let channel = ctx.channel_mut();
    channel.append_reply(&Sexp::plist([("erase", Sexp::t())]));
    let found = channel.drain_matches(&mut matches, max);
    channel.append_reply(&Sexp::plist([("found", count(found))]));
    debug!(target: DISPATCH_TARGET, query = expr, found, "find completed");
    Ok(())
}

fn add(ctx: &mut RequestContext<'_>, args: &Arguments<'_>) -> Result<(), CommandError> {
    let path = args.required_string(":path")?;
    let docid = ctx.store().add(Path::new(path))?;
    let reply = Sexp::plist([
        ("info", Sexp::symbol("add")),
        ("path", Sexp::string(path)),
        ("docid", Sexp::number(i64::from(docid))),
    ]);
    ctx.channel_mut().append_reply(&reply);
    Ok(())
}

fn remove(ctx: &mut RequestContext<'_>, args: &Arguments<'_>) -> Result<(), CommandError> {
    let raw = args.required_number(":docid")?;
    let docid = DocId::try_from(raw)
        .map_err(|_| CommandError::invalid_argument(format!("invalid docid {raw}")))?;
    ctx.store().remove(docid)?;
    ctx.channel_mut()
        .append_reply(&Sexp::plist([("remove", Sexp::number(raw))]));
    Ok(())
}

fn index_status(status: &str, stats: &IndexStats) -> Sexp {
    Sexp::plist([
        ("info", Sexp::symbol("index")),
        ("status", Sexp::symbol(status)),
        ("processed", count(stats.processed)),
        ("updated", count(stats.updated)),
        ("removed", count(stats.removed)),
    ])
}

fn index(ctx: &mut RequestContext<'_>, args: &Arguments<'_>) -> Result<(), CommandError> {
    let store = ctx.store();
    let root = match args.string(":path")? {
        Some(path) => PathBuf::from(path),
        None => store.root()?.ok_or_else(|| {
            CommandError::invalid_argument("missing required :path and no maildir is configured")
        })?,
    };

    let channel = ctx.channel_mut();
    let stats = store.index(&root, |progress| {
        channel.emit_out_of_band(&index_status("running", progress));
    })?;
    channel.append_reply(&index_status("complete", &stats));
    Ok(())
}
