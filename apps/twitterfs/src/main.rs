// Author: Lukas Bower
// Purpose: twitterfs binary entry point.

//! Entry point: load config, build the OAuth client, serve 9P.

use std::sync::Arc;

use twitterfs::api::HttpApi;
use twitterfs::config::Config;
use twitterfs::{server, TwitterFs};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = Config::load_default()?;
    let (owner, group) = process_identity();
    let api = HttpApi::new(&config);
    let fs = Arc::new(TwitterFs::new(
        Box::new(api),
        &config.screen_name,
        &owner,
        &group,
    ));
    server::serve(fs, &config.listen_address)
}

/// Owner/group stamped into every stat entry: `$user` when set (the
/// Plan 9 convention), otherwise the uid/gid translated to names.
fn process_identity() -> (String, String) {
    if let Ok(user) = std::env::var("user") {
        if !user.is_empty() {
            return (user.clone(), user);
        }
    }
    let uid = nix::unistd::getuid();
    let gid = nix::unistd::getgid();
    let owner = nix::unistd::User::from_uid(uid)
        .ok()
        .flatten()
        .map(|user| user.name)
        .unwrap_or_else(|| uid.to_string());
    let group = nix::unistd::Group::from_gid(gid)
        .ok()
        .flatten()
        .map(|group| group.name)
        .unwrap_or_else(|| gid.to_string());
    (owner, group)
}
