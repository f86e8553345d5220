use clap::{Args, Parser, Subcommand};
use futures::executor::block_on;
use lagoon::download::DirectoryDownloadSink;
use lagoon::process::{DEFAULT_PROGRAM, ProcessCompiler};
use lagoon::raster::ResvgRasterizer;
use lagoon::{
    BUILTIN_THEMES, BackgroundOverride, ExportPipeline, FontOverride, HeadlessSurface,
    NodeResolver, PreviewCommand, PreviewSession, PreviewSettings, ThemeConfig, builtin_theme,
};
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum CliError {
    Usage(String),
    Io(std::io::Error),
    Theme(lagoon::ThemeError),
    Color(lagoon::ColorError),
    Compile(lagoon::CompileError),
    Export(lagoon::ExportError),
    UnknownNode(String),
    NoDiagram,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Theme(err) => write!(f, "{err}"),
            CliError::Color(err) => write!(f, "{err}"),
            CliError::Compile(err @ lagoon::CompileError::Syntax { detail }) => {
                write!(f, "{err}\n{detail}")
            }
            CliError::Export(err) => write!(f, "{}: {err}", err.alert_text()),
            CliError::UnknownNode(id) => write!(f, "No diagram element matches `{id}`"),
            CliError::NoDiagram => write!(f, "Input is empty; nothing to render"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<lagoon::ThemeError> for CliError {
    fn from(value: lagoon::ThemeError) -> Self {
        Self::Theme(value)
    }
}

impl From<lagoon::ColorError> for CliError {
    fn from(value: lagoon::ColorError) -> Self {
        Self::Color(value)
    }
}

impl From<lagoon::ExportError> for CliError {
    fn from(value: lagoon::ExportError) -> Self {
        Self::Export(value)
    }
}

#[derive(Parser, Debug)]
#[command(name = "lagoon-cli")]
#[command(about = "Compile, recolor and export Mermaid diagrams through the lagoon preview pipeline")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a diagram and export it as PNG (transparent) or JPG.
    Render(RenderArgs),
    /// List the built-in themes.
    Themes,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Diagram source file, or `-` for stdin.
    #[arg(default_value = "-")]
    input: String,

    /// Built-in theme key.
    #[arg(long, default_value = "linearLight", conflicts_with = "theme_file")]
    theme: String,

    /// Theme definition as JSON.
    #[arg(long)]
    theme_file: Option<PathBuf>,

    /// Background color, or `default` for the theme's own.
    #[arg(long, default_value = "default")]
    background: String,

    /// Font family, or `default` for the theme's own.
    #[arg(long, default_value = "default")]
    font: String,

    /// Recolor an element: `<id>=<#hex>`. The id may be the name used in the source or the
    /// element id in the compiled SVG. Repeatable.
    #[arg(long = "color", value_name = "ID=#HEX")]
    colors: Vec<String>,

    /// Export a PNG without background instead of a JPG.
    #[arg(long)]
    transparent: bool,

    /// Directory the exported image is written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Also write the post-processed SVG to this path.
    #[arg(long)]
    svg_out: Option<PathBuf>,

    /// Diagram compiler executable.
    #[arg(long, default_value = DEFAULT_PROGRAM)]
    compiler: PathBuf,
}

fn read_input(input: &str) -> Result<String, CliError> {
    match input {
        "-" => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        path => Ok(std::fs::read_to_string(path)?),
    }
}

fn load_theme(args: &RenderArgs) -> Result<ThemeConfig, CliError> {
    match &args.theme_file {
        Some(path) => Ok(ThemeConfig::from_json(&std::fs::read_to_string(path)?)?),
        None => Ok(builtin_theme(&args.theme)?),
    }
}

fn parse_color_arg(arg: &str) -> Result<(&str, &str), CliError> {
    match arg.rsplit_once('=') {
        Some((id, hex)) if !id.trim().is_empty() && !hex.trim().is_empty() => {
            Ok((id.trim(), hex.trim()))
        }
        _ => Err(CliError::Usage(format!(
            "invalid --color value `{arg}` (expected <id>=<#hex>)"
        ))),
    }
}

/// Picks `fill` for the element whose logical or raw id equals `id` in the shown markup.
fn recolor(session: &mut PreviewSession, id: &str, fill: &str, now: Instant) -> Result<(), CliError> {
    let markup = session.view().markup.clone();
    let doc = roxmltree::Document::parse(&markup)
        .map_err(|err| CliError::Usage(format!("compiled SVG is not well-formed: {err}")))?;
    let resolver = NodeResolver::new();
    let target = doc.descendants().find(|node| {
        node.attribute("id").is_some_and(|raw| {
            raw == id || resolver.logical_id(raw).is_some_and(|logical| logical == id)
        })
    });
    let Some(target) = target else {
        return Err(CliError::UnknownNode(id.to_string()));
    };
    match session.pick_color(target, &doc.root_element(), fill, now)? {
        Some(node) => {
            tracing::info!(logical_id = %node.logical_id, raw_id = %node.raw_id, %fill, "recolored");
            Ok(())
        }
        None => Err(CliError::UnknownNode(id.to_string())),
    }
}

fn compile(session: &mut PreviewSession, compiler: &ProcessCompiler) -> Result<(), CliError> {
    block_on(session.render_now(compiler));
    if let Some(err) = &session.view().error {
        return Err(CliError::Compile(err.clone()));
    }
    Ok(())
}

fn render(args: RenderArgs) -> Result<(), CliError> {
    let source = read_input(&args.input)?;
    if source.trim().is_empty() {
        return Err(CliError::NoDiagram);
    }
    let colors = args
        .colors
        .iter()
        .map(|c| parse_color_arg(c))
        .collect::<Result<Vec<_>, _>>()?;

    let settings = PreviewSettings::default();
    let mut session = PreviewSession::new(load_theme(&args)?, settings.clone());
    let now = Instant::now();
    session.set_background(BackgroundOverride::parse(&args.background), now);
    session.set_font(FontOverride::parse(&args.font), now);
    session.set_source(source, now);

    let compiler = ProcessCompiler::new(&args.compiler);
    compile(&mut session, &compiler)?;

    for (id, fill) in colors {
        recolor(&mut session, id, fill, now)?;
    }
    // Flowchart colors rewrite the source; pick up the rewritten version.
    compile(&mut session, &compiler)?;

    if let Some(path) = &args.svg_out {
        std::fs::write(path, &session.view().markup)?;
    }

    let mut surface = HeadlessSurface::new();
    session.present(&mut surface);
    let Some(request) = session.handle(PreviewCommand::Export {
        transparent: args.transparent,
    }) else {
        return Err(CliError::NoDiagram);
    };

    let pipeline = ExportPipeline::new(PreviewSettings {
        export_completion_delay_ms: 0,
        ..settings
    });
    let sink = DirectoryDownloadSink::new(&args.out_dir);
    let result = block_on(pipeline.export(&request, &mut surface, &ResvgRasterizer::new(), &sink));
    session.record_export(&result);
    let report = result?;

    println!("{}", sink.dir().join(&report.file_name).display());
    Ok(())
}

fn themes() -> Result<(), CliError> {
    for key in BUILTIN_THEMES {
        let theme = builtin_theme(key)?;
        println!("{key}\t{}", theme.name);
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Render(args) => render(args),
        Command::Themes => themes(),
    };

    match result {
        Ok(()) => {}
        Err(err @ CliError::Usage(_)) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
        Err(err @ CliError::NoDiagram) => {
            eprintln!("{err}");
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_args_split_on_last_equals() {
        assert_eq!(parse_color_arg("A=#ff0000").unwrap(), ("A", "#ff0000"));
        assert_eq!(parse_color_arg("a=b=#fff").unwrap(), ("a=b", "#fff"));
        assert!(matches!(parse_color_arg("A"), Err(CliError::Usage(_))));
        assert!(matches!(parse_color_arg("=#fff"), Err(CliError::Usage(_))));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn render_args_default_to_stdin_and_builtin_theme() {
        let cli = Cli::try_parse_from(["lagoon-cli", "render", "--color", "A=#fff", "--color", "B=#000"]).unwrap();
        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.input, "-");
        assert_eq!(args.theme, "linearLight");
        assert_eq!(args.colors, vec!["A=#fff", "B=#000"]);
        assert_eq!(args.compiler, PathBuf::from("mmdc"));
    }
}
