use std::path::PathBuf;

use figment::{
    providers::{Format, Toml},
    Figment,
};
use gumdrop::Options;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use nfs4_share::acl::Nfs4Tools;
use nfs4_share::config::Config;
use nfs4_share::manage::{self, Grantees};

#[derive(Debug, Options)]
struct Args {
    #[options(help = "print help message")]
    help: bool,

    #[options(count, help = "increases output verbosity (-vv for debug)")]
    verbose: u32,

    #[options(help = "path of the configuration file")]
    configuration_file: Option<PathBuf>,

    #[options(command)]
    command: Option<Command>,
}

#[derive(Debug, Options)]
enum Command {
    #[options(help = "create a share directory")]
    Create(CreateOpts),
    #[options(help = "add items, users or groups to a share directory")]
    Add(AddOpts),
    #[options(help = "delete a share directory")]
    Delete(DeleteOpts),
    #[options(help = "lock a share against structural change")]
    Lock(TargetOpts),
    #[options(help = "unlock a share for maintenance")]
    Unlock(TargetOpts),
}

#[derive(Debug, Options)]
struct CreateOpts {
    #[options(help = "print help message")]
    help: bool,

    #[options(free, required, help = "path of the directory representing the share")]
    share_directory: PathBuf,

    #[options(short = "i", help = "path of a file or directory to share")]
    item: Vec<PathBuf>,

    #[options(short = "u", help = "give access to a user")]
    user: Vec<String>,

    #[options(short = "g", help = "give access to a group")]
    group: Vec<String>,

    #[options(no_short, help = "let a user manage the share")]
    managing_user: Vec<String>,

    #[options(no_short, help = "let a group manage the share")]
    managing_group: Vec<String>,

    #[options(
        no_short,
        help = "service application account that should have access (e.g. the HTTP server account)"
    )]
    service_account: Vec<String>,

    #[options(
        short = "d",
        help = "NFSv4 domain for user and group principals (default: resolved from the id-mapping configuration)"
    )]
    domain: Option<String>,

    #[options(no_short, help = "leave the share unlocked after creation")]
    no_lock: bool,
}

#[derive(Debug, Options)]
struct AddOpts {
    #[options(help = "print help message")]
    help: bool,

    #[options(free, required, help = "path of the directory representing the share")]
    share_directory: PathBuf,

    #[options(short = "i", help = "path of a file or directory to share")]
    item: Vec<PathBuf>,

    #[options(short = "u", help = "give access to a user")]
    user: Vec<String>,

    #[options(short = "g", help = "give access to a group")]
    group: Vec<String>,

    #[options(no_short, help = "let a user manage the share")]
    managing_user: Vec<String>,

    #[options(no_short, help = "let a group manage the share")]
    managing_group: Vec<String>,

    #[options(no_short, help = "service application account that should have access")]
    service_account: Vec<String>,

    #[options(short = "d", help = "NFSv4 domain for user and group principals")]
    domain: Option<String>,

    #[options(no_short, help = "lock the share afterwards")]
    lock: bool,
}

#[derive(Debug, Options)]
struct DeleteOpts {
    #[options(help = "print help message")]
    help: bool,

    #[options(free, required, help = "path of the directory representing the share")]
    share_directory: PathBuf,

    #[options(
        short = "f",
        help = "un-share files even when they carry their last hard link (i.e. delete data)"
    )]
    force: bool,
}

#[derive(Debug, Options)]
struct TargetOpts {
    #[options(help = "print help message")]
    help: bool,

    #[options(free, required, help = "path of the directory representing the share")]
    share_directory: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse_args_default_or_exit();

    let level = match args.verbose {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let config: Config = Figment::new()
        .merge(Toml::file(
            args.configuration_file
                .as_deref()
                .unwrap_or_else(|| std::path::Path::new("nfs4share.toml")),
        ))
        .extract()?;

    let Some(command) = args.command else {
        eprintln!("{}", Args::usage());
        eprintln!("\nsubcommands:\n{}", Args::command_list().unwrap_or_default());
        std::process::exit(1);
    };

    match command {
        Command::Create(opts) => {
            let tools = Nfs4Tools::from_config(&config, opts.domain);
            let grantees = Grantees {
                users: opts.user,
                groups: opts.group,
                managing_users: opts.managing_user,
                managing_groups: opts.managing_group,
                service_accounts: opts.service_account,
            };
            let share = manage::create(
                &tools,
                &config,
                &opts.share_directory,
                &opts.item,
                &grantees,
                !opts.no_lock,
            )?;
            info!("filesystem path to share is: {}", share.directory().display());
        }
        Command::Add(opts) => {
            let tools = Nfs4Tools::from_config(&config, opts.domain);
            let grantees = Grantees {
                users: opts.user,
                groups: opts.group,
                managing_users: opts.managing_user,
                managing_groups: opts.managing_group,
                service_accounts: opts.service_account,
            };
            let share = manage::add(
                &tools,
                &opts.share_directory,
                &opts.item,
                &grantees,
                opts.lock,
            )?;
            info!("filesystem path to share is: {}", share.directory().display());
        }
        Command::Delete(opts) => {
            let tools = Nfs4Tools::from_config(&config, None);
            manage::delete(&tools, &config, &opts.share_directory, opts.force)?;
        }
        Command::Lock(opts) => {
            let tools = Nfs4Tools::from_config(&config, None);
            manage::lock(&tools, &opts.share_directory)?;
        }
        Command::Unlock(opts) => {
            let tools = Nfs4Tools::from_config(&config, None);
            manage::unlock(&tools, &opts.share_directory)?;
        }
    }

    Ok(())
}
