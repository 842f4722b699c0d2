use clap::{Arg, ArgAction, ArgMatches, Command};
use page_sync::{
    ContentTree, DuplicateOptions, InterchangeDocument, PageDuplicator, SyncConfig,
    apply_page_title, parse_document, resolve_page, translate_page,
};
use std::error::Error;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String, Box<dyn Error>> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| format!("missing argument <{}>", name).into())
}

fn snapshot_arg() -> Arg {
    Arg::new("snapshot")
        .help("Content tree snapshot (JSON)")
        .required(true)
        .index(1)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("page-sync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Offline page duplication and translation round-trip")
        .subcommand_required(true)
        .arg(
            Arg::new("root")
                .long("root")
                .global(true)
                .help("Tree root holding the page (default: staging_root setting)"),
        )
        .subcommand(
            Command::new("export")
                .about("Print the interchange document of a page")
                .arg(snapshot_arg())
                .arg(Arg::new("slug").required(true).index(2)),
        )
        .subcommand(
            Command::new("import")
                .about("Re-inject a translated document into one language of a page")
                .arg(snapshot_arg())
                .arg(Arg::new("slug").required(true).index(2))
                .arg(
                    Arg::new("language")
                        .help("Site language code")
                        .required(true)
                        .index(3),
                )
                .arg(
                    Arg::new("document")
                        .help("Translated interchange document")
                        .required(true)
                        .index(4),
                ),
        )
        .subcommand(
            Command::new("duplicate")
                .about("Copy a page from one tree root onto the same slug in another")
                .arg(snapshot_arg())
                .arg(Arg::new("slug").required(true).index(2))
                .arg(
                    Arg::new("to")
                        .long("to")
                        .help("Destination root (default: production_root setting)"),
                )
                .arg(
                    Arg::new("language")
                        .long("language")
                        .short('l')
                        .help("Restrict to a language; repeatable")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("publish")
                        .long("publish")
                        .short('p')
                        .help("Publish the destination afterwards")
                        .action(ArgAction::SetTrue),
                ),
        )
        .get_matches();

    let config = SyncConfig::from_env()?;
    let (command, sub) = matches.subcommand().ok_or("missing subcommand")?;
    // Global, so it lands on the subcommand's matches
    let root = sub
        .get_one::<String>("root")
        .cloned()
        .unwrap_or_else(|| config.staging_root.clone());

    match command {
        "export" => {
            let tree = ContentTree::load_json(Path::new(arg(sub, "snapshot")?))?;
            let page = resolve_page(&tree, &root, arg(sub, "slug")?)?;
            let public = tree.public_object(page)?.unwrap_or(page);
            println!("{}", InterchangeDocument::from_page(&tree, public)?.render());
        }
        "import" => {
            let snapshot = Path::new(arg(sub, "snapshot")?);
            let language = arg(sub, "language")?;
            let mut tree = ContentTree::load_json(snapshot)?;
            let page = resolve_page(&tree, &root, arg(sub, "slug")?)?;

            let html = std::fs::read_to_string(arg(sub, "document")?)?;
            let parsed = parse_document(&html)?;
            let report = translate_page(&mut tree, page, language, &parsed.records)?;
            if let Some(title) = parsed.title.filter(|t| !t.trim().is_empty()) {
                apply_page_title(&mut tree, page, language, &title)?;
            }
            tree.save_json(snapshot)?;

            println!(
                "{}: {} applied, {} untouched, {} ambiguous",
                report.language,
                report.applied.len(),
                report.untouched.len(),
                report.ambiguous.len()
            );
        }
        "duplicate" => {
            let snapshot = Path::new(arg(sub, "snapshot")?);
            let slug = arg(sub, "slug")?;
            let to = sub
                .get_one::<String>("to")
                .cloned()
                .unwrap_or_else(|| config.production_root.clone());
            let languages: Option<Vec<String>> = sub
                .get_many::<String>("language")
                .map(|values| values.cloned().collect());

            let mut tree = ContentTree::load_json(snapshot)?;
            let source = resolve_page(&tree, &root, slug)?;
            let destination = resolve_page(&tree, &to, slug)?;
            let options = DuplicateOptions {
                publish: sub.get_flag("publish"),
                user: None,
                languages,
            };
            let report = PageDuplicator::new(config.language_codes())
                .duplicate(&mut tree, source, destination, &options)?;
            tree.save_json(snapshot)?;

            println!("Copied {} plugins", report.copied_plugins);
            for failure in report.failures() {
                if let Err(e) = &failure.result {
                    eprintln!("{}: {}", failure.language, e);
                }
            }
        }
        other => return Err(format!("unknown subcommand {}", other).into()),
    }

    Ok(())
}
