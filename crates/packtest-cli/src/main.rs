use anyhow::Result;
use clap::{Parser, Subcommand};
use packtest::{handle_generate, GenerateRequest};
use packtest_core::plugin::TEMP_DIR_PREFIX;
use packtest_core::{ConflictScope, VersionRange};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "packtest")]
#[command(about = "Generate the package.json of a smoke test for a packed library", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate package.json for the test package from a bundle description
    Generate {
        /// Bundle description (JSON map of chunk id to chunk)
        #[arg(short, long)]
        bundle: PathBuf,

        /// Directory to start looking for the library's package.json
        #[arg(long, env = "PACKTEST_ROOT_DIR")]
        root_dir: Option<PathBuf>,

        /// Use this manifest instead of searching for package.json
        #[arg(long)]
        package_json: Option<PathBuf>,

        /// Partial package.json merged over the generated one
        #[arg(short, long)]
        test_package_json: Option<PathBuf>,

        /// Directory to write package.json into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Bundle output file; package.json goes next to it
        #[arg(long)]
        output_file: Option<PathBuf>,

        /// Fail when an override range conflicts with the library's range
        #[arg(long)]
        check_semver_conflicts: bool,

        /// Names checked for conflicts: computed or declared
        #[arg(long, default_value = "computed")]
        conflict_scope: ConflictScope,

        /// Treat import() references as used modules
        #[arg(long)]
        dynamic_imports: bool,

        /// Prefix of the temporary directory used when no output is given
        #[arg(long, default_value = TEMP_DIR_PREFIX)]
        temp_prefix: String,

        /// Print the document instead of writing it
        #[arg(long)]
        print: bool,
    },

    /// Check whether two version ranges can be satisfied together
    Intersects {
        /// First range (e.g. "^3.1.8")
        left: String,

        /// Second range (e.g. "^5.2.1")
        right: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug) // Show target module in debug mode
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate {
            bundle,
            root_dir,
            package_json,
            test_package_json,
            output_dir,
            output_file,
            check_semver_conflicts,
            conflict_scope,
            dynamic_imports,
            temp_prefix,
            print,
        } => {
            let generated = handle_generate(GenerateRequest {
                bundle,
                root_dir,
                package_json,
                test_package_json,
                output_dir,
                output_file,
                check_semver_conflicts,
                conflict_scope,
                dynamic_imports,
                temp_prefix,
                print,
            })
            .await?;
            if !print {
                info!("Wrote {}", generated.path.display());
                println!("{}", generated.path.display());
            }
            Ok(())
        }
        Commands::Intersects { left, right } => {
            let left_range = VersionRange::parse(&left)?;
            let right_range = VersionRange::parse(&right)?;
            let intersects = left_range.intersects(&right_range);
            info!("{} => {}", left, left_range);
            info!("{} => {}", right, right_range);
            println!("{}", intersects);
            if intersects {
                Ok(())
            } else {
                std::process::exit(1)
            }
        }
    }
}
