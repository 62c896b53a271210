use clap::Parser;
use resizer::config::{self, ConfigOverrides};
use resizer::{logging, pipeline};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser)]
#[command(name = "resizer")]
#[command(about = "Fetch an image from S3, resize it, and re-encode it")]
#[command(long_about = "\
Fetch an image from S3, resize it, and re-encode it

The image is read from s3://BUCKET/KEY (or an http/https mirror of the bucket),
resized, encoded as JPEG or PNG, and written to stdout unless --output is given.

Resize policy:
  no bounds           keep the original size
  --max-width only    width becomes exactly MAX_WIDTH, height follows the aspect
  --max-height only   height becomes exactly MAX_HEIGHT, width follows the aspect
  both bounds         largest size that fits inside the box, aspect kept

Every flag can also be set through the environment variable shown in its help,
or in a TOML file passed with --config. Flags beat the environment, which beats
the file.

Exit status: 0 on success, 2 on invalid configuration, 1 on any other failure.

Run 'resizer --gen-config' to print a documented config file.")]
#[command(version)]
struct Cli {
    /// Maximum output width in pixels (0 = unset)
    #[arg(long, env = "MAX_WIDTH", allow_negative_numbers = true)]
    max_width: Option<i64>,

    /// Maximum output height in pixels (0 = unset)
    #[arg(long, env = "MAX_HEIGHT", allow_negative_numbers = true)]
    max_height: Option<i64>,

    /// Interpolation kernel: nearest-neighbor, bilinear, bicubic,
    /// mitchell-netravali, lanczos2, lanczos3
    #[arg(long, env = "RESIZE_STRATEGY")]
    resize_strategy: Option<String>,

    /// Output format: jpeg or png
    #[arg(long, env = "FORMAT")]
    format: Option<String>,

    /// JPEG quality, 0-100
    #[arg(long, env = "JPEG_COMPRESSION", allow_negative_numbers = true)]
    jpeg_compression: Option<i64>,

    /// PNG compression: none, best-speed, default, best-compression
    #[arg(long, env = "PNG_COMPRESSION")]
    png_compression: Option<String>,

    /// Source bucket
    #[arg(long, env = "S3_BUCKET")]
    s3_bucket: Option<String>,

    /// Source object key
    #[arg(long, env = "S3_KEY")]
    s3_key: Option<String>,

    /// How to read the object: authenticated, https, or http
    #[arg(long, env = "S3_READ_METHOD")]
    s3_read_method: Option<String>,

    /// Host serving path-style bucket URLs
    #[arg(long, env = "S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    /// Region for signing authenticated requests
    #[arg(long, env = "AWS_REGION")]
    s3_region: Option<String>,

    /// Request timeout in seconds
    #[arg(long, allow_negative_numbers = true)]
    timeout_secs: Option<i64>,

    /// Write the image to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML config file
    #[arg(long, env = "RESIZER_CONFIG")]
    config: Option<PathBuf>,

    /// Print a stock config file with all options documented, then exit
    #[arg(long)]
    gen_config: bool,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            max_width: self.max_width,
            max_height: self.max_height,
            strategy: self.resize_strategy.clone(),
            format: self.format.clone(),
            jpeg_quality: self.jpeg_compression,
            png_compression: self.png_compression.clone(),
            bucket: self.s3_bucket.clone(),
            key: self.s3_key.clone(),
            read_method: self.s3_read_method.clone(),
            endpoint: self.s3_endpoint.clone(),
            region: self.s3_region.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.gen_config {
        print!("{}", config::stock_config_toml());
        return ExitCode::SUCCESS;
    }

    logging::init(cli.verbose);

    let result = config::load_config(cli.config.as_deref(), &cli.overrides())
        .map_err(pipeline::PipelineError::from)
        .and_then(|config| pipeline::transform(&config, cli.output.as_deref()));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(stage = %err.stage(), "{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
