//! Command-line entry point.

use std::path::PathBuf;

use clap::Parser;

use pod_pack::{run, PackOptions};

/// Pack a source podspec into a zipped binary xcframework distribution.
#[derive(Parser, Debug)]
#[command(name = "pod-pack", version, about)]
struct Cli {
    /// Path or HTTP(S) URL of the podspec to pack.
    podspec: String,

    /// Base URL the zip will be uploaded under.
    artifact_repo_url: String,

    /// Build static frameworks instead of dynamic ones.
    #[arg(long)]
    use_static_frameworks: bool,

    /// Synthesize module maps from the pod's public headers.
    #[arg(long)]
    generate_module_map: bool,

    /// Lint with --allow-warnings.
    #[arg(long)]
    allow_warnings: bool,

    /// Run `pod install` with --repo-update.
    #[arg(long)]
    repo_update: bool,

    /// Directory the files/ and zips/ trees are created under.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Skip linting the generated binary podspec.
    #[arg(long)]
    skip_validation: bool,

    /// Platforms to skip (comma-separated: ios,osx,watchos,tvos).
    #[arg(long, value_delimiter = ',')]
    skip_platforms: Vec<String>,

    /// Extra arguments appended to every xcodebuild invocation.
    #[arg(long)]
    xcodebuild_opts: Option<String>,

    /// Emit the binary podspec as JSON instead of the Ruby DSL.
    #[arg(long)]
    use_json: bool,

    /// Spec repo sources for `pod install` and linting (comma-separated).
    #[arg(long, value_delimiter = ',')]
    sources: Vec<String>,

    /// Print every external command and its output.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run(&PackOptions {
        podspec: cli.podspec,
        artifact_repo_url: cli.artifact_repo_url,
        use_static_frameworks: cli.use_static_frameworks,
        generate_module_map: cli.generate_module_map,
        allow_warnings: cli.allow_warnings,
        repo_update: cli.repo_update,
        out_dir: cli.out_dir,
        skip_validation: cli.skip_validation,
        skipped_platforms: cli.skip_platforms,
        xcodebuild_opts: cli.xcodebuild_opts,
        use_json: cli.use_json,
        sources: cli.sources,
        verbose: cli.verbose,
    })
}
