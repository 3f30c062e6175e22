//! Command-line interface for xmlbind

#[cfg(feature = "cli")]
use clap::{Parser as ClapParser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use xmlbind::loaders::SchemaResolver;
#[cfg(feature = "cli")]
use xmlbind::locations::Location;
#[cfg(feature = "cli")]
use xmlbind::schema::Declaration;
#[cfg(feature = "cli")]
use xmlbind::{Configuration, Parser, ParserOptions, QName};

#[cfg(feature = "cli")]
#[derive(ClapParser, Debug)]
#[command(name = "xmlbind")]
#[command(author, version, about = "Schema-driven XML data binding tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse an XML document and print the bound value as JSON
    Parse {
        /// Path to the XSD schema file
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Path to the XML file to parse
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Fail on elements and attributes the schema does not declare
        #[arg(long)]
        strict: bool,

        /// Type for an undeclared root element, in {namespace}local form
        #[arg(long, value_name = "TYPE")]
        root_type: Option<String>,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// List the binding chain of every global element of a schema
    Inspect {
        /// Path to the XSD schema file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse {
            schema,
            file,
            strict,
            root_type,
            pretty,
        } => cmd_parse(schema, file, strict, root_type, pretty),
        Commands::Inspect { schema } => cmd_inspect(schema),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Load a schema file with everything it includes and build a parser for it
#[cfg(feature = "cli")]
fn load_parser(schema_path: PathBuf, options: ParserOptions) -> Result<Parser, Box<dyn std::error::Error>> {
    let resolver = SchemaResolver::default().with_limits(options.limits.clone());
    let mut documents = resolver.resolve_location(None, Location::Path(schema_path))?.into_iter();
    let main = documents.next().ok_or("schema file produced no document")?;

    let namespace = main.target_namespace.clone().unwrap_or_default();
    let configuration = Configuration::new(namespace).with_schema(main);
    let parser = Parser::with_options(vec![std::sync::Arc::new(configuration)], options);
    for document in documents {
        parser.index().add_document(document);
    }
    Ok(parser)
}

#[cfg(feature = "cli")]
fn cmd_parse(
    schema_path: PathBuf,
    file: PathBuf,
    strict: bool,
    root_type: Option<String>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = ParserOptions::new().with_strict(strict);
    if let Some(ref name) = root_type {
        options = options.with_root_type(&QName::from_clark(name)?);
    }
    let parser = load_parser(schema_path, options)?;

    let xml = fs::read_to_string(&file)?;
    let value = parser.parse_str(&xml)?;

    let json = value.to_json();
    let output = if pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    };
    println!("{}", output);
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_inspect(schema_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let parser = load_parser(schema_path, ParserOptions::new())?;
    let index = parser.index();

    let mut elements = index.global_elements();
    elements.sort_by_key(|e| e.name.to_string());

    for element in elements {
        let type_name = index
            .element_type(&element)
            .map(|t| t.display_name())
            .unwrap_or_else(|| "unresolved".to_string());
        println!("{} : {}", element.name, type_name);

        let declaration = Declaration::Element(element);
        let chain = parser.walker().resolve(&declaration, None, parser.context())?;
        if chain.is_empty() {
            println!("  (no bindings)");
        }
        for (position, link) in chain.links().iter().enumerate() {
            let kind = if link.binding.is_simple() { "simple" } else { "complex" };
            println!(
                "  {}. {} [{}, {:?}]",
                position + 1,
                link.key,
                kind,
                link.binding.execution_mode()
            );
        }
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
