#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
extern crate loggerv;

extern crate rbaccat;

use rbaccat::audit::AuditEvent;
use rbaccat::parallel::{self, Query};
use rbaccat::*;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

fn print_error_debug(e: &Error) {
    // unwind the error chain
    for e in e.iter().skip(1) {
        warn!("caused by: {}", e);
    }
}

fn result_exit<T>(name: &str, x: Result<T>) {
    let _ = x.map_err(|e| {
        error!("{} error: {}", name, e);
        print_error_debug(&e);
        debug!("{}: {:?}", name, e); // in the off-chance that Debug is useful
        process::exit(1);
    });
    process::exit(0);
}

fn conditional_exit<T>(x: Result<T>) -> T {
    match x {
        Ok(v) => v,
        Err(e) => {
            error!("error: {}", e);
            print_error_debug(&e);
            debug!("{:?}", e);
            process::exit(1);
        }
    }
}

/// Policy paths from the command line, falling back to the config
fn policy_paths(args: &ArgMatches, conf: &Config) -> Result<Vec<PathBuf>> {
    let paths = match args.values_of("filename") {
        Some(vs) => vs.map(PathBuf::from).collect::<Vec<_>>(),
        None => conf.policies.clone(),
    };
    if paths.is_empty() {
        bail!("no policies given: pass -f or set policies in {}", config::CONFIG_FILE);
    }
    Ok(paths)
}

fn identity(a: &ArgMatches) -> Identity {
    let user = a.value_of("as").unwrap(); // required
    let groups = a.values_of("as-group")
        .map(|vs| vs.map(String::from).collect::<Vec<_>>())
        .unwrap_or_default();
    Identity::from(Subject::parse(user)).with_groups(groups)
}

fn namespace<'a>(a: &'a ArgMatches) -> &'a str {
    if a.is_present("cluster") {
        ""
    } else {
        a.value_of("namespace").unwrap_or("default")
    }
}

fn request(a: &ArgMatches) -> Request {
    let verb = a.value_of("verb").unwrap();
    let resource = a.value_of("resource").unwrap();
    if resource.starts_with('/') {
        return Request::non_resource(verb, resource);
    }
    let mut req = Request::resource(verb, a.value_of("api-group").unwrap_or(""), resource, namespace(a));
    if let Some(sub) = a.value_of("subresource") {
        req = req.with_subresource(sub);
    }
    if let Some(n) = a.value_of("name") {
        req = req.named(n);
    }
    req
}

fn batch(file: &str, workers: usize, authz: &Authorizer) -> Result<()> {
    let data = fs::read_to_string(file)?;
    let queries: Vec<Query> = serde_yaml::from_str(&data)?;
    let snap = authz.store().snapshot();
    for (q, d) in parallel::authorize_all(snap, queries, workers)? {
        println!("{}", AuditEvent::new(&q.identity(), &q.request, &d).to_json()?);
    }
    Ok(())
}

fn main() {
    let identity_args = || vec![
        Arg::with_name("as")
            .long("as")
            .takes_value(true)
            .required(true)
            .help("User to ask for (system:serviceaccount:<ns>:<name> for service accounts)"),
        Arg::with_name("as-group")
            .long("as-group")
            .takes_value(true)
            .multiple(true)
            .number_of_values(1)
            .help("Group the user is a member of"),
        Arg::with_name("namespace")
            .short("n")
            .long("namespace")
            .takes_value(true)
            .help("Namespace to ask about (default: default)"),
        Arg::with_name("cluster")
            .long("cluster")
            .conflicts_with("namespace")
            .help("Ask about the cluster scope only"),
    ];

    let app = App::new("rbaccat")
        .version(crate_version!())
        .setting(AppSettings::VersionlessSubcommands)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .setting(AppSettings::ColoredHelp)
        .setting(AppSettings::DeriveDisplayOrder)
        .global_settings(&[AppSettings::ColoredHelp])
        .about("Evaluate kubernetes rbac manifests right meow")
        .arg(Arg::with_name("verbose")
            .short("v")
            .multiple(true)
            .global(true)
            .help("Increase verbosity"))
        .arg(Arg::with_name("debug")
            .short("d")
            .long("debug")
            .global(true)
            .help("Adds line numbers to log statements"))
        .arg(Arg::with_name("filename")
            .short("f")
            .long("filename")
            .takes_value(true)
            .multiple(true)
            .number_of_values(1)
            .global(true)
            .help("Policy file or directory to load (repeatable)"))

        .subcommand(SubCommand::with_name("validate")
            .arg(Arg::with_name("strict")
                .long("strict")
                .help("Fail on bindings referencing missing roles"))
            .about("Validate rbac policy files"))

        .subcommand(SubCommand::with_name("can-i")
            .arg(Arg::with_name("verb")
                .required(true)
                .help("Verb to check (get, list, delete, ...)"))
            .arg(Arg::with_name("resource")
                .required(true)
                .help("Resource to check, or a non-resource url starting with /"))
            .args(&identity_args())
            .arg(Arg::with_name("api-group")
                .long("api-group")
                .takes_value(true)
                .help("API group of the resource (default: core)"))
            .arg(Arg::with_name("subresource")
                .long("subresource")
                .takes_value(true)
                .help("Subresource such as log or scale"))
            .arg(Arg::with_name("name")
                .long("name")
                .takes_value(true)
                .help("Name of the object"))
            .arg(Arg::with_name("audit")
                .long("audit")
                .help("Print a json audit record of the decision"))
            .about("Check whether an action is allowed"))

        .subcommand(SubCommand::with_name("list-rules")
            .args(&identity_args())
            .about("List the rules a user holds in a namespace"))

        .subcommand(SubCommand::with_name("list")
            .arg(Arg::with_name("objects")
                .required(true)
                .possible_values(&["roles", "bindings"])
                .help("What to list"))
            .about("List loaded roles or bindings"))

        .subcommand(SubCommand::with_name("batch")
            .arg(Arg::with_name("queries")
                .required(true)
                .help("Yaml file with a list of queries"))
            .arg(Arg::with_name("workers")
                .short("w")
                .long("workers")
                .takes_value(true)
                .help("Number of worker threads"))
            .about("Evaluate many queries in parallel and print audit records"));

    let args = app.get_matches();

    // by default, always show INFO messages for now (+1)
    loggerv::Logger::new()
        .verbosity(args.occurrences_of("verbose") + 1)
        .module_path(true)
        .line_numbers(args.is_present("debug"))
        .init()
        .unwrap();

    conditional_exit(rbaccat::init());
    let conf = conditional_exit(Config::read());
    let paths = conditional_exit(policy_paths(&args, &conf));

    if let Some(a) = args.subcommand_matches("validate") {
        let strict = a.is_present("strict") || conf.strict;
        result_exit(args.subcommand_name().unwrap(), validate::policies(&paths, strict))
    }

    let snap = conditional_exit(filebacked::load(&paths));
    let authz = Authorizer::new(Arc::new(PolicyStore::new(snap)));

    if let Some(a) = args.subcommand_matches("can-i") {
        let id = identity(a);
        let req = request(a);
        let decision = authz.authorize_request(&id, &req);
        for diag in &decision.diagnostics {
            debug!("{}", diag);
        }
        if a.is_present("audit") || conf.audit {
            let ev = AuditEvent::new(&id, &req, &decision);
            println!("{}", conditional_exit(ev.to_json()));
        }
        info!("{}", decision);
        println!("{}", if decision.allowed { "yes" } else { "no" });
        process::exit(if decision.allowed { 0 } else { 1 });
    }

    if let Some(a) = args.subcommand_matches("list-rules") {
        let grants = authz.rules_for(&identity(a), namespace(a));
        result_exit(args.subcommand_name().unwrap(), list::rules(&grants))
    }

    if let Some(a) = args.subcommand_matches("list") {
        let snap = authz.store().snapshot();
        let res = match a.value_of("objects").unwrap() {
            "roles" => list::roles(&snap),
            _ => list::bindings(&snap),
        };
        result_exit(args.subcommand_name().unwrap(), res)
    }

    if let Some(a) = args.subcommand_matches("batch") {
        let file = a.value_of("queries").unwrap();
        let workers = match a.value_of("workers") {
            Some(_) => conditional_exit(value_t!(a, "workers", usize).map_err(|e| Error::from(e.to_string()))),
            None => conf.workers,
        };
        result_exit(args.subcommand_name().unwrap(), batch(file, workers, &authz))
    }

    unreachable!("Subcommand valid, but not implemented");
}
