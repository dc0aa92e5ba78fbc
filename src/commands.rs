use crate::codec::{self, Compression, Header};
use crate::error::{Error, Result};
use crate::gfx;
use crate::img::{Dimensions, RawImage};
use clap::Subcommand;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a raw RGBA8 buffer to .png, guessing a square size unless WIDTH and HEIGHT are given
    Convert {
        #[arg(default_value = "output.raw")]
        source: PathBuf,
        #[arg(default_value = "foo.png")]
        destination: PathBuf,
        #[arg(requires = "height", value_parser = clap::value_parser!(u32).range(1..))]
        width: Option<u32>,
        #[arg(requires = "width", value_parser = clap::value_parser!(u32).range(1..))]
        height: Option<u32>,
        #[arg(short, long, value_enum, default_value_t)]
        compression: Compression,
    },
    /// Convert several raw buffers, writing each next to its input with a .png extension
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short = 'W', long, requires = "height", value_parser = clap::value_parser!(u32).range(1..))]
        width: Option<u32>,
        #[arg(short = 'H', long, requires = "width", value_parser = clap::value_parser!(u32).range(1..))]
        height: Option<u32>,
        #[arg(short, long, value_enum, default_value_t)]
        compression: Compression,
    },
    /// Create .png images from a dimension-prefixed RGBA byte stream on stdin
    Write {
        output_path: PathBuf,
        #[arg(short, long, help = "Keep reading frames until stdin closes")]
        forever: bool,
        #[arg(short, long, help = "Number each frame: <stem>00001.png, <stem>00002.png, ...")]
        numbered: bool,
        #[arg(short, long, value_enum, default_value_t)]
        compression: Compression,
    },
    /// List the chunks of a .png file and check their CRCs
    Inspect { file_path: PathBuf },
    /// Display a raw RGBA8 buffer in a window
    View {
        source: PathBuf,
        #[arg(requires = "height", value_parser = clap::value_parser!(u32).range(1..))]
        width: Option<u32>,
        #[arg(requires = "width", value_parser = clap::value_parser!(u32).range(1..))]
        height: Option<u32>,
    },
}

/// How a raw buffer is interpreted and encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Explicit `(width, height)`; `None` infers a square from the buffer length.
    pub size: Option<(u32, u32)>,
    pub compression: Compression,
}

impl ConvertOptions {
    fn new(width: Option<u32>, height: Option<u32>, compression: Compression) -> Self {
        ConvertOptions {
            size: width.zip(height),
            compression,
        }
    }

    pub fn dimensions(&self, len: usize) -> Result<Dimensions> {
        match self.size {
            Some((width, height)) => Dimensions::new(width, height),
            None => Dimensions::infer(len),
        }
    }
}

impl Command {
    pub fn run(self) -> Result<()> {
        match self {
            Command::Convert {
                source,
                destination,
                width,
                height,
                compression,
            } => convert(
                &source,
                &destination,
                ConvertOptions::new(width, height, compression),
            ),
            Command::Batch {
                files,
                width,
                height,
                compression,
            } => batch(&files, ConvertOptions::new(width, height, compression)),
            Command::Write {
                output_path,
                forever,
                numbered,
                compression,
            } => write(
                &mut io::stdin().lock(),
                &output_path,
                forever,
                numbered,
                compression,
            ),
            Command::Inspect { file_path } => inspect(&file_path),
            Command::View {
                source,
                width,
                height,
            } => view(&source, ConvertOptions::new(width, height, Compression::Default)),
        }
    }
}

fn load_raw(path: &Path, options: ConvertOptions) -> Result<RawImage> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let dims = options.dimensions(bytes.len())?;
    log::debug!(
        "{}: {} bytes as {}x{}",
        path.display(),
        bytes.len(),
        dims.width,
        dims.height
    );
    RawImage::decode(&bytes, dims)
}

fn save_png(img: &RawImage, path: &Path, compression: Compression) -> Result<()> {
    // encode fully before touching the destination
    let encoded = codec::encode_img(img, compression)?;
    fs::write(path, &encoded).map_err(|e| Error::io(path, e))?;
    log::info!(
        "wrote {}x{} image to {} ({} bytes)",
        img.width,
        img.height,
        path.display(),
        encoded.len()
    );
    Ok(())
}

pub fn convert(source: &Path, destination: &Path, options: ConvertOptions) -> Result<()> {
    let img = load_raw(source, options)?;
    save_png(&img, destination, options.compression)
}

pub fn batch(files: &[PathBuf], options: ConvertOptions) -> Result<()> {
    for file_path in files {
        let extension = file_path.extension().and_then(|ext| ext.to_str());
        if extension.is_some_and(|ext| ext.eq_ignore_ascii_case("png")) {
            log::warn!("skipping {}: already a .png", file_path.display());
            continue;
        }
        if extension.is_none_or(|ext| !ext.eq_ignore_ascii_case("raw")) {
            log::warn!("{} has no .raw extension", file_path.display());
        }
        let output_path = file_path.with_extension("png");
        convert(file_path, &output_path, options)?;
    }
    Ok(())
}

fn frame_path(output_path: &Path, n: usize) -> PathBuf {
    let stem = output_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();
    output_path.with_file_name(format!("{}{:0>5}.png", stem, n))
}

pub fn write(
    input: &mut impl Read,
    output_path: &Path,
    forever: bool,
    numbered: bool,
    compression: Compression,
) -> Result<()> {
    let mut n = 0;
    while let Some(img) = RawImage::read_prefixed(input)? {
        n += 1;
        let out_path = if numbered {
            frame_path(output_path, n)
        } else {
            output_path.to_path_buf()
        };
        save_png(&img, &out_path, compression)?;

        if !forever {
            return Ok(());
        }
    }

    if n == 0 {
        log::warn!("no frames on stdin");
    }
    Ok(())
}

pub fn inspect(file_path: &Path) -> Result<()> {
    let bytes = fs::read(file_path).map_err(|e| Error::io(file_path, e))?;
    let chunks = codec::chunks(&bytes)?;
    for chunk in &chunks {
        println!("{}", chunk);
    }
    println!("{}", Header::from_chunks(&chunks)?);
    Ok(())
}

fn view(source: &Path, options: ConvertOptions) -> Result<()> {
    let img = load_raw(source, options)?;
    gfx::show(&img, &source.display().to_string())
}
