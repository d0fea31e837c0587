use anyhow::{bail, Context, Result};
use serde_json::json;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use login_counter::{
    init_logging, Config, Feature, LoginCounter, LoginDispatcher, LoginEvent, LoginHook,
    ObjectRegistry, OptionKey, OptionStore, SqliteStore, Subject, SubjectKind,
};

const USAGE: &str = "\
Usage: login-counter [--config <file>] <command>

Commands:
  login <user_id> [login_name]   Record a successful login
  count user <user_id>           Show a user's login count
  count role <role>              Show the summed login count of a role
  adduser <user_id> <login_name> Register a user
  assign <user_id> <role>        Add a user to a role
  unassign <user_id> <role>      Remove a user from a role
  set <user_id> <value>          Overwrite a user's stored count";

fn main() -> Result<()> {
    init_logging();

    let mut args: Vec<String> = env::args().skip(1).collect();

    let config_path = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            if i + 1 >= args.len() {
                bail!("--config needs a file path");
            }
            let path = PathBuf::from(args.remove(i + 1));
            args.remove(i);
            Some(path)
        }
        None => None,
    };

    let config = Config::load_or_default(config_path.as_deref())?;

    if args.is_empty() {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    tracing::debug!(database = ?config.database_path, "Database opened");

    match args[0].as_str() {
        "login" => run_login(&store, &config, &args[1..]),
        "count" => run_count(&store, &config, &args[1..]),
        "adduser" => {
            let (user_id, name) = two_args(&args[1..], "adduser <user_id> <login_name>")?;
            store.register_user(parse_user_id(user_id)?, name)?;
            println!("✓ Registered user {} as {}", user_id, name);
            Ok(())
        }
        "assign" => {
            let (user_id, role) = two_args(&args[1..], "assign <user_id> <role>")?;
            store.assign_role(parse_user_id(user_id)?, role)?;
            println!("✓ User {} added to role {}", user_id, role);
            Ok(())
        }
        "unassign" => {
            let (user_id, role) = two_args(&args[1..], "unassign <user_id> <role>")?;
            store.remove_role(parse_user_id(user_id)?, role)?;
            println!("✓ User {} removed from role {}", user_id, role);
            Ok(())
        }
        "set" => {
            let (user_id, value) = two_args(&args[1..], "set <user_id> <value>")?;
            let value: u64 = value
                .parse()
                .with_context(|| format!("Invalid count: {}", value))?;
            let key = OptionKey::for_user(LoginCounter::UID, parse_user_id(user_id)?);
            store.write(&key, json!(value))?;
            println!("✓ Stored count for user {} set to {}", user_id, value);
            Ok(())
        }
        other => {
            eprintln!("❌ Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    }
}

fn run_login(store: &Arc<SqliteStore>, config: &Config, args: &[String]) -> Result<()> {
    let Some(user_id) = args.first() else {
        bail!("usage: login <user_id> [login_name]");
    };
    let user_id = parse_user_id(user_id)?;
    let login_name = args.get(1).cloned().unwrap_or_default();

    let registry = Arc::new(ObjectRegistry::with_login_counter(store.clone(), store.clone()));

    let mut dispatcher = LoginDispatcher::new();
    LoginHook::new(Arc::clone(&registry), store.clone()).bind(&mut dispatcher);

    dispatcher.fire(&LoginEvent::new(login_name, user_id))?;

    let view = Feature::login_counter(config).content(&Subject::user(user_id), &registry)?;
    if let Some(view) = view {
        println!("✓ Login recorded for user {} (total: {})", user_id, view.count);
    }
    Ok(())
}

fn run_count(store: &Arc<SqliteStore>, config: &Config, args: &[String]) -> Result<()> {
    let (kind, id) = two_args(args, "count <user|role> <id>")?;

    let subject = match SubjectKind::parse(kind) {
        Some(SubjectKind::User) => Subject::user(parse_user_id(id)?),
        Some(SubjectKind::Role) => Subject::role(id),
        Some(SubjectKind::Visitor) => bail!("Visitors have no login counter"),
        None => bail!("Unknown subject kind: {} (expected user or role)", kind),
    };

    let registry = ObjectRegistry::with_login_counter(store.clone(), store.clone());
    let feature = Feature::login_counter(config);

    let Some(view) = feature.content(&subject, &registry)? else {
        bail!("Login counter is not available");
    };

    println!("📊 {} logins: {}", subject, view.count);

    if let Subject::User { id } = subject {
        if let Some(at) = store.updated_at(&OptionKey::for_user(LoginCounter::UID, id))? {
            println!("   last counted: {}", at.to_rfc3339());
        }
    }
    Ok(())
}

fn two_args<'a>(args: &'a [String], usage: &str) -> Result<(&'a str, &'a str)> {
    match args {
        [a, b, ..] => Ok((a.as_str(), b.as_str())),
        _ => bail!("usage: {}", usage),
    }
}

fn parse_user_id(raw: &str) -> Result<u64> {
    raw.parse()
        .with_context(|| format!("Invalid user id: {}", raw))
}
