// Author: Lukas Bower
// Purpose: Parse and execute commands written to /ctl.

//! Control-file dispatch.
//!
//! A write to `/ctl` is one whitespace-tokenized command. `post` and
//! `reply` keep the raw bytes after the verb (and, for `reply`, after
//! the id token) verbatim as the message body; the byte arithmetic
//! assumes an ASCII verb opening the write and a single separator after
//! it, so multibyte whitespace there is not handled.

use log::debug;

use crate::api::ApiError;
use crate::fs::{FsState, TwitterFs};
use crate::node::{NodeId, NodeKind};
use crate::FsError;

/// One parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Reload,
    Batch(usize),
    Older(String),
    Newer(String),
    Trim(String, usize),
    Post(String),
    Reply { id: String, body: String },
}

/// Tokenize one control write.
pub(crate) fn parse(data: &[u8]) -> Result<Command, FsError> {
    let text = String::from_utf8_lossy(data);
    let fields: Vec<&str> = text.split_whitespace().collect();
    let Some((&verb, args)) = fields.split_first() else {
        return Err(FsError::UnknownCommand);
    };
    match verb {
        "reply" if args.len() > 1 => {
            let id = args[0].to_owned();
            // Strip "reply " plus the id; whatever follows, separator
            // included, is the body.
            let start = 6 + id.len();
            let body = String::from_utf8_lossy(data.get(start..).unwrap_or_default()).into_owned();
            Ok(Command::Reply { id, body })
        }
        "post" if !args.is_empty() => {
            // Strip "post" and the separator.
            let body = String::from_utf8_lossy(data.get(5..).unwrap_or_default()).into_owned();
            Ok(Command::Post(body))
        }
        "reload" => Ok(Command::Reload),
        "batch" if args.len() == 1 => match args[0].parse::<usize>() {
            Ok(size) => Ok(Command::Batch(size)),
            Err(err) => Err(FsError::Io(format!("{:?}: {err}", args[0]))),
        },
        "older" if args.len() == 1 => Ok(Command::Older(args[0].to_owned())),
        "newer" if args.len() == 1 => Ok(Command::Newer(args[0].to_owned())),
        "trim" if args.len() == 2 => {
            let size = args[1]
                .parse::<i64>()
                .map_err(|err| FsError::Io(format!("{:?}: {err}", args[1])))?;
            if size < 0 {
                return Err(FsError::Io(format!(
                    "{:?}: can't trim to negative size",
                    args[1]
                )));
            }
            Ok(Command::Trim(args[0].to_owned(), size as usize))
        }
        _ => Err(FsError::UnknownCommand),
    }
}

/// Execute one control write against the tree and the upstream API.
pub(crate) fn dispatch(fs: &TwitterFs, state: &mut FsState, data: &[u8]) -> Result<(), FsError> {
    let command = parse(data)?;
    debug!("ctl: {command:?}");
    match command {
        Command::Reload => {
            // The next traversal of /users re-fetches the follow list;
            // existing entries are kept.
            if let Some(users) = state.tree.child(state.root, "users") {
                state.tree.node_mut(users).loaded = false;
            }
            Ok(())
        }
        Command::Batch(size) => {
            state.batch_size = size;
            Ok(())
        }
        Command::Older(target) => {
            let dest = resolve_target(state, &target).ok_or_else(enoent_io)?;
            let max_id = window_bound(state.tree.node(dest).min_id.clone());
            let timeline = fetch(fs, state, dest, None, max_id.as_deref())?;
            state.tree.add_timeline(dest, &timeline);
            Ok(())
        }
        Command::Newer(target) => {
            let dest = resolve_target(state, &target).ok_or_else(enoent_io)?;
            let since_id = window_bound(state.tree.node(dest).max_id.clone());
            let timeline = fetch(fs, state, dest, since_id.as_deref(), None)?;
            state.tree.add_timeline(dest, &timeline);
            Ok(())
        }
        Command::Trim(target, size) => {
            let dest = resolve_target(state, &target).ok_or_else(enoent_io)?;
            state.tree.trim(dest, size);
            Ok(())
        }
        Command::Post(body) => fs
            .api()
            .post_update(&body, None)
            .map_err(|err| FsError::Io(err.to_string())),
        Command::Reply { id, body } => fs
            .api()
            .post_update(&body, Some(&id))
            .map_err(|err| FsError::Io(err.to_string())),
    }
}

/// `home`, `mentions`, or `@<screen>`; anything else has no node.
fn resolve_target(state: &FsState, target: &str) -> Option<NodeId> {
    if let Some(screen_name) = target.strip_prefix('@') {
        let users = state.tree.child(state.root, "users")?;
        state.tree.child(users, screen_name)
    } else if target == "home" || target == "mentions" {
        state.tree.child(state.root, target)
    } else {
        None
    }
}

/// Call the timeline API matching the target's kind.
fn fetch(
    fs: &TwitterFs,
    state: &FsState,
    dest: NodeId,
    since_id: Option<&str>,
    max_id: Option<&str>,
) -> Result<Vec<crate::api::Post>, FsError> {
    let batch = state.batch_size;
    let result: Result<_, ApiError> = match state.tree.node(dest).kind {
        NodeKind::User => {
            fs.api()
                .user_timeline(&state.tree.node(dest).stat.name, batch, since_id, max_id)
        }
        NodeKind::Home => fs.api().home_timeline(batch, since_id, max_id),
        NodeKind::Mentions => fs.api().mentions_timeline(batch, since_id, max_id),
        _ => return Err(enoent_io()),
    };
    result.map_err(|err| FsError::Io(err.to_string()))
}

/// An empty window bound means "no bound" on the wire.
fn window_bound(id: String) -> Option<String> {
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Target nodes that do not exist surface as EIO, not as a walk miss.
fn enoent_io() -> FsError {
    FsError::Io(FsError::NoEntry.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_plain_verbs() {
        assert_eq!(parse(b"reload"), Ok(Command::Reload));
        assert_eq!(parse(b"batch 50"), Ok(Command::Batch(50)));
        assert_eq!(parse(b"older @npr"), Ok(Command::Older("@npr".to_owned())));
        assert_eq!(parse(b"newer home"), Ok(Command::Newer("home".to_owned())));
        assert_eq!(
            parse(b"trim mentions 5"),
            Ok(Command::Trim("mentions".to_owned(), 5))
        );
    }

    #[test]
    fn post_body_is_the_bytes_after_the_verb() {
        assert_eq!(
            parse(b"post hello  world"),
            Ok(Command::Post("hello  world".to_owned()))
        );
    }

    #[test]
    fn reply_body_keeps_the_separator_after_the_id() {
        assert_eq!(
            parse(b"reply 12345678 hi there"),
            Ok(Command::Reply {
                id: "12345678".to_owned(),
                body: " hi there".to_owned(),
            })
        );
    }

    #[test]
    fn arity_mismatches_are_unknown_commands() {
        for bad in [
            &b""[..],
            b"frobnicate",
            b"post",
            b"reply 12345678",
            b"older",
            b"older home mentions",
            b"newer",
            b"trim home",
            b"batch",
            b"batch 1 2",
        ] {
            assert_eq!(parse(bad), Err(FsError::UnknownCommand), "{bad:?}");
        }
    }

    #[test]
    fn numeric_arguments_must_parse() {
        match parse(b"batch many") {
            Err(FsError::Io(message)) => assert!(message.contains("many")),
            other => panic!("unexpected {other:?}"),
        }
        match parse(b"trim home -3") {
            Err(FsError::Io(message)) => {
                assert!(message.contains("can't trim to negative size"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse(b"trim home lots") {
            Err(FsError::Io(message)) => assert!(message.contains("lots")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
