//! Property Flyer CLI tool
//!
//! A command-line tool for rendering property flyers and watermarking photos.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use glob::glob;
use std::path::{Path, PathBuf};
use std::process;

use property_flyer::batch::{process_batch, BatchInput, OutputMode};
use property_flyer::config::{AssetConfig, AssetPaths, WatermarkSettings};
use property_flyer::flyer::{
    build_expanded_pdf, build_flyer_with_attachments, build_quadrant_pdf, flyer_file_name,
    FlyerRequest, PropertyRecord, COMBINED_PREFIX, FLYER_PREFIX,
};
use property_flyer::pdf::extract_metadata;
use property_flyer::photo::PhotoAsset;
use property_flyer::watermark::Anchor;

/// Property Flyer - Real-estate flyers and watermarked photo batches
#[derive(Parser)]
#[command(name = "property-flyer")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Expanded flyer with the watermark centred on the cover
    property-flyer flyer --cover capa.jpg --name \"Edifício Itagua\" --neighborhood Aldeota \\
        --price \"R$ 720.000,00\" --anchor Centro

    # Quadrant flyer from a JSON property file with a photo mosaic
    property-flyer flyer --layout quadrant --property imovel.json --cover capa.jpg --gallery \"fotos/*.jpg\"

    # Flyer followed by every batch photo on its own page
    property-flyer flyer --cover capa.jpg --attach \"fotos/*.jpg\" --open

    # Watermark a folder of photos into a ZIP
    property-flyer batch --mode archive -o saida \"fotos/*.jpg\"")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a one-page property flyer
    Flyer(FlyerArgs),

    /// Watermark a batch of photos
    Batch {
        /// Input photos (JPEG/PNG). Supports glob patterns like "*.jpg"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// How to package the results
        #[arg(long, value_enum, default_value_t = ModeArg::SingleDocument)]
        mode: ModeArg,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        #[command(flatten)]
        assets: AssetArgs,

        #[command(flatten)]
        watermark: WatermarkArgs,

        /// Open the output after creation (single-document and archive modes)
        #[arg(long)]
        open: bool,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

#[derive(Args)]
struct FlyerArgs {
    /// Cover photo
    #[arg(long)]
    cover: PathBuf,

    /// Page layout
    #[arg(long, value_enum, default_value_t = LayoutArg::Expanded)]
    layout: LayoutArg,

    /// Mosaic photos for the quadrant layout (first four are used)
    #[arg(long, num_args = 1..)]
    gallery: Vec<String>,

    /// Photos appended after the flyer, one per page (expanded layout only)
    #[arg(long, num_args = 1..)]
    attach: Vec<String>,

    /// JSON file with property details; flags below override its values
    #[arg(long)]
    property: Option<PathBuf>,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    neighborhood: Option<String>,

    #[arg(long)]
    address: Option<String>,

    /// Price text, printed as typed
    #[arg(long)]
    price: Option<String>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    bedrooms: Option<String>,

    #[arg(long)]
    suites: Option<String>,

    #[arg(long)]
    bathrooms: Option<String>,

    #[arg(long)]
    parking: Option<String>,

    /// Area in square metres
    #[arg(long)]
    area: Option<String>,

    /// Whether pets are allowed
    #[arg(long, value_enum)]
    pet: Option<PetArg>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    #[command(flatten)]
    assets: AssetArgs,

    #[command(flatten)]
    watermark: WatermarkArgs,

    /// Open the output file after creation
    #[arg(long)]
    open: bool,
}

#[derive(Args)]
struct AssetArgs {
    /// Logo image
    #[arg(long, default_value = property_flyer::config::DEFAULT_LOGO)]
    logo: PathBuf,

    /// Watermark image
    #[arg(long, default_value = property_flyer::config::DEFAULT_WATERMARK)]
    watermark_image: PathBuf,

    /// JSON table of base64 detail icons
    #[arg(long)]
    icons: Option<PathBuf>,

    /// TrueType font for regular text (needs --font-bold too)
    #[arg(long)]
    font_regular: Option<PathBuf>,

    /// TrueType font for bold text
    #[arg(long)]
    font_bold: Option<PathBuf>,
}

impl AssetArgs {
    fn load(&self) -> AssetConfig {
        AssetConfig::load(&AssetPaths {
            logo: Some(self.logo.clone()),
            watermark: Some(self.watermark_image.clone()),
            icons: self.icons.clone(),
            font_regular: self.font_regular.clone(),
            font_bold: self.font_bold.clone(),
        })
    }
}

#[derive(Args)]
struct WatermarkArgs {
    /// Watermark position: a form label ("Canto inferior direito") or an id (bottom-right)
    #[arg(long, default_value = "Canto inferior direito")]
    anchor: String,

    /// Watermark size, percent of the photo's shorter side (5-60)
    #[arg(long, default_value_t = 20)]
    scale: u32,

    /// Watermark opacity percent (5-100)
    #[arg(long, default_value_t = 60)]
    opacity: u32,

    /// Distance from the photo edges in pixels (0-2000)
    #[arg(long, default_value_t = 24)]
    margin: u32,

    /// Repeat the watermark across the photo
    #[arg(long)]
    tile: bool,
}

impl WatermarkArgs {
    fn settings(&self) -> anyhow::Result<WatermarkSettings> {
        let settings = WatermarkSettings {
            anchor: self.anchor.parse::<Anchor>()?,
            scale_percent: self.scale,
            opacity_percent: self.opacity,
            margin_px: self.margin,
            tile: self.tile,
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Expanded,
    Quadrant,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    SingleDocument,
    IndividualFiles,
    Archive,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::SingleDocument => OutputMode::SingleDocument,
            ModeArg::IndividualFiles => OutputMode::IndividualFiles,
            ModeArg::Archive => OutputMode::Archive,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PetArg {
    #[value(alias = "sim")]
    Yes,
    #[value(alias = "nao")]
    No,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Flyer(args) => cmd_flyer(args),
        Commands::Batch {
            inputs,
            mode,
            out_dir,
            assets,
            watermark,
            open,
        } => cmd_batch(inputs, mode.into(), out_dir, assets, watermark, open),
        Commands::Info { input } => cmd_info(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Expand glob patterns in input paths
fn expand_globs(patterns: Vec<String>) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched = false;
            for entry in glob(&pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))? {
                match entry {
                    Ok(path) => {
                        paths.push(path);
                        matched = true;
                    }
                    Err(e) => log::warn!("glob error for {}: {}", pattern, e),
                }
            }
            if !matched {
                bail!("No files matched pattern: {}", pattern);
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }

    // Sort paths for consistent ordering
    paths.sort();

    Ok(paths)
}

/// Open a file with the system default application
fn open_file(path: &Path) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

fn read_inputs(patterns: Vec<String>) -> anyhow::Result<Vec<BatchInput>> {
    expand_globs(patterns)?
        .iter()
        .map(|path| BatchInput::from_path(path).map_err(anyhow::Error::from))
        .collect()
}

fn property_record(args: &FlyerArgs) -> anyhow::Result<PropertyRecord> {
    let mut record = match &args.property {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            PropertyRecord::from_json(&json)?
        }
        None => PropertyRecord::default(),
    };

    let overrides = [
        (&args.name, &mut record.name),
        (&args.neighborhood, &mut record.neighborhood),
        (&args.address, &mut record.address),
        (&args.price, &mut record.price_text),
        (&args.description, &mut record.description),
        (&args.bedrooms, &mut record.rooms.bedrooms),
        (&args.suites, &mut record.rooms.suites),
        (&args.bathrooms, &mut record.rooms.bathrooms),
        (&args.parking, &mut record.rooms.parking),
        (&args.area, &mut record.rooms.area_m2),
    ];
    for (flag, field) in overrides {
        if let Some(value) = flag {
            *field = value.clone();
        }
    }
    if let Some(pet) = args.pet {
        record.rooms.pet_allowed = Some(matches!(pet, PetArg::Yes));
    }
    Ok(record)
}

/// Render a flyer, optionally followed by attached photos
fn cmd_flyer(args: FlyerArgs) -> anyhow::Result<()> {
    let settings = args.watermark.settings()?;
    let assets = args.assets.load();
    let watermark = assets.watermark_spec(&settings)?;
    if watermark.is_none() {
        log::warn!("No watermark image; photos are placed unmarked");
    }
    let record = property_record(&args)?;

    let cover_bytes = std::fs::read(&args.cover)
        .with_context(|| format!("Cover photo not found: {}", args.cover.display()))?;
    let cover = PhotoAsset::decode_upright(&cover_bytes)?;

    let mut gallery = Vec::new();
    for path in expand_globs(args.gallery.clone())? {
        match std::fs::read(&path)
            .map_err(property_flyer::Error::from)
            .and_then(|bytes| PhotoAsset::decode_upright(&bytes))
        {
            Ok(photo) => gallery.push(photo),
            Err(e) => log::warn!("Skipping gallery photo {}: {}", path.display(), e),
        }
    }

    let request = FlyerRequest::new(&record, &cover)
        .with_gallery(&gallery)
        .with_watermark(watermark.as_ref());
    let now = chrono::Local::now().naive_local();

    let (bytes, name) = match args.layout {
        LayoutArg::Quadrant if !args.attach.is_empty() => {
            bail!("--attach is only available with the expanded layout")
        }
        LayoutArg::Quadrant => (
            build_quadrant_pdf(&request, &assets)?,
            flyer_file_name(FLYER_PREFIX, now),
        ),
        LayoutArg::Expanded if args.attach.is_empty() => (
            build_expanded_pdf(&request, &assets)?,
            flyer_file_name(FLYER_PREFIX, now),
        ),
        LayoutArg::Expanded => {
            let attachments = read_inputs(args.attach.clone())?;
            eprintln!("Attaching {} photo(s)...", attachments.len());
            (
                build_flyer_with_attachments(&request, &assets, &attachments)?,
                flyer_file_name(COMBINED_PREFIX, now),
            )
        }
    };

    std::fs::create_dir_all(&args.out_dir)?;
    let output = args.out_dir.join(name);
    std::fs::write(&output, bytes)?;
    eprintln!("Flyer written to: {}", output.display());

    if args.open {
        open_file(&output)?;
    }

    Ok(())
}

/// Watermark photos and write the packaged results
fn cmd_batch(
    inputs: Vec<String>,
    mode: OutputMode,
    out_dir: PathBuf,
    assets: AssetArgs,
    watermark: WatermarkArgs,
    open: bool,
) -> anyhow::Result<()> {
    let settings = watermark.settings()?;
    let spec = assets.load().require_watermark_spec(&settings)?;
    let inputs = read_inputs(inputs)?;

    eprintln!("Watermarking {} photo(s) into {}...", inputs.len(), mode);
    let output = process_batch(&inputs, &spec, mode, &mut |done, total| {
        eprintln!("[{:3}%] {}/{}", done * 100 / total, done, total);
    })?;

    for failure in &output.failures {
        eprintln!("Failed: {} ({})", failure.name, failure.reason);
    }

    std::fs::create_dir_all(&out_dir)?;
    let mut written = Vec::new();
    for file in &output.files {
        let path = out_dir.join(&file.name);
        std::fs::write(&path, &file.bytes)?;
        eprintln!("Wrote: {}", path.display());
        written.push(path);
    }

    if open && mode != OutputMode::IndividualFiles {
        if let Some(path) = written.first() {
            open_file(path)?;
        }
    }

    if output.files.is_empty() {
        bail!("No photo could be processed");
    }
    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> anyhow::Result<()> {
    let metadata = extract_metadata(&input)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);
    if let Some(title) = &metadata.title {
        println!("Title: {}", title);
    }
    if let Some(producer) = &metadata.producer {
        println!("Producer: {}", producer);
    }
    for (i, (width, height)) in metadata.page_sizes.iter().enumerate() {
        println!("  Page {}: {:.1} x {:.1} pt", i + 1, width, height);
    }

    Ok(())
}
