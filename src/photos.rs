//! Photo step: fetch each respondent's photo and convert it to WebP

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use crate::config::{Config, ImageConfig};
use crate::drive::{DriveClient, FetchedPhoto, PhotoSource};
use crate::error::PhotoError;
use crate::types::{ResponseRecord, CONVERTED_EXTENSION, SOURCE_EXTENSIONS};

/// What happened to one record's photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoOutcome {
    /// Downloaded and converted this run
    Downloaded { original_bytes: u64, webp_bytes: u64 },
    /// Converted from a source-format file already on disk
    ConvertedLocal { original_bytes: u64, webp_bytes: u64 },
    /// WebP already present, nothing fetched
    AlreadyPresent,
    /// No share link in the response
    NoLink,
}

#[derive(Debug, Default)]
pub struct PhotoReport {
    pub downloaded: usize,
    pub converted_local: usize,
    pub already_present: usize,
    /// Names of respondents who gave no photo link
    pub no_link: Vec<String>,
    /// (name, error) for every record whose photo failed
    pub failed: Vec<(String, PhotoError)>,
    /// Stale source-format files removed after the batch
    pub cleaned: usize,
    pub total_webp_bytes: u64,
}

impl PhotoReport {
    pub fn succeeded(&self) -> usize {
        self.downloaded + self.converted_local + self.already_present
    }

    /// True when there were photos to get and none of them made it
    pub fn is_total_failure(&self) -> bool {
        !self.failed.is_empty() && self.succeeded() == 0
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PhotoError + '_ {
    move |source| PhotoError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Path of the current (WebP) photo for a record
pub fn webp_path(output_dir: &Path, record: &ResponseRecord) -> PathBuf {
    output_dir.join(record.photo_filename())
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// A source-format photo (`photo_NN_Name.jpg` etc.) left on disk, if any
pub fn find_source_photo(output_dir: &Path, stem: &str) -> Option<PathBuf> {
    SOURCE_EXTENSIONS
        .iter()
        .map(|ext| output_dir.join(format!("{}.{}", stem, ext)))
        .find(|p| p.is_file())
}

/// Decode `source`, shrink to `settings.max_dimension`, and write `dest` as
/// lossy WebP at `settings.quality`.
///
/// The encoded image goes to a `.part` file first and is renamed into place,
/// so `dest` is either absent or complete. Returns the size of `dest`.
pub fn convert_to_webp(source: &Path, dest: &Path, settings: &ImageConfig) -> Result<u64, PhotoError> {
    let bytes = fs::read(source).map_err(io_error(source))?;
    let img = image::load_from_memory(&bytes).map_err(PhotoError::DecodeFailure)?;

    let max = settings.max_dimension;
    let img = if img.width() > max || img.height() > max {
        img.resize(max, max, FilterType::Lanczos3)
    } else {
        img
    };

    // libwebp takes 8-bit RGB(A) only
    let img = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    let encoded = webp::Encoder::from_image(&img)
        .map_err(|e| PhotoError::EncodeFailure(e.to_string()))?
        .encode(settings.quality.clamp(0.0, 100.0));

    let part = dest.with_extension(format!("{}.part", CONVERTED_EXTENSION));
    if let Err(e) = fs::write(&part, &*encoded) {
        let _ = fs::remove_file(&part);
        return Err(io_error(&part)(e));
    }

    fs::rename(&part, dest).map_err(io_error(dest))?;
    match file_len(dest) {
        0 => Err(PhotoError::Io {
            path: dest.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "empty WebP file"),
        }),
        len => Ok(len),
    }
}

/// Extension for the downloaded bytes before conversion
fn source_extension(photo: &FetchedPhoto) -> &'static str {
    let format = image::guess_format(&photo.bytes)
        .ok()
        .or_else(|| ImageFormat::from_mime_type(&photo.content_type));
    match format {
        Some(ImageFormat::Jpeg) => "jpg",
        Some(ImageFormat::Png) => "png",
        _ => "download",
    }
}

/// Make sure one record ends up with exactly one WebP photo
pub fn process_photo(
    record: &ResponseRecord,
    source: &dyn PhotoSource,
    config: &Config,
) -> Result<PhotoOutcome, PhotoError> {
    let output_dir = config.output_dir.as_path();
    let dest = webp_path(output_dir, record);
    let stem = record.photo_stem();

    if file_len(&dest) > 0 {
        return Ok(PhotoOutcome::AlreadyPresent);
    }

    if let Some(existing) = find_source_photo(output_dir, &stem) {
        let original_bytes = file_len(&existing);
        match convert_to_webp(&existing, &dest, &config.image) {
            Ok(webp_bytes) => {
                fs::remove_file(&existing).map_err(io_error(&existing))?;
                return Ok(PhotoOutcome::ConvertedLocal {
                    original_bytes,
                    webp_bytes,
                });
            }
            // A saved error page or truncated download; refetch from the link
            Err(PhotoError::DecodeFailure(e)) => {
                eprintln!("   Discarding unreadable {}: {}", existing.display(), e);
                fs::remove_file(&existing).map_err(io_error(&existing))?;
            }
            Err(e) => return Err(e),
        }
    }

    if record.photo_url.is_empty() {
        return Ok(PhotoOutcome::NoLink);
    }

    let fetched = source.fetch(&record.photo_url);
    thread::sleep(source.politeness_delay());
    let fetched = fetched?;

    let download = output_dir.join(format!("{}.{}", stem, source_extension(&fetched)));
    fs::write(&download, &fetched.bytes).map_err(io_error(&download))?;

    let converted = convert_to_webp(&download, &dest, &config.image);
    // The download is either superseded or unusable
    let _ = fs::remove_file(&download);

    Ok(PhotoOutcome::Downloaded {
        original_bytes: fetched.bytes.len() as u64,
        webp_bytes: converted?,
    })
}

/// Remove `photo_*` source-format files whose WebP counterpart exists
pub fn remove_stale_sources(output_dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|e| e.to_str()),
        ) else {
            continue;
        };
        if !stem.starts_with("photo_")
            || !SOURCE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
        {
            continue;
        }
        let webp = output_dir.join(format!("{}.{}", stem, CONVERTED_EXTENSION));
        if webp.is_file() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn describe_saving(original: u64, webp: u64) -> String {
    if original == 0 {
        return format!("{} bytes", webp);
    }
    let ratio = (original as f64 - webp as f64) / original as f64 * 100.0;
    format!("{} -> {} bytes ({:.1}% smaller)", original, webp, ratio)
}

/// Process every record's photo. Per-record failures are collected, not returned.
pub fn process_all(
    records: &[ResponseRecord],
    source: &dyn PhotoSource,
    config: &Config,
    quiet: bool,
) -> Result<PhotoReport> {
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;

    let mut report = PhotoReport::default();
    let total = records.len();

    for (i, record) in records.iter().enumerate() {
        if !quiet {
            println!("[{}/{}] {}", i + 1, total, record.name);
        }

        match process_photo(record, source, config) {
            Ok(PhotoOutcome::Downloaded {
                original_bytes,
                webp_bytes,
            }) => {
                report.downloaded += 1;
                if !quiet {
                    println!(
                        "   Downloaded {}: {}",
                        record.photo_filename(),
                        describe_saving(original_bytes, webp_bytes)
                    );
                }
            }
            Ok(PhotoOutcome::ConvertedLocal {
                original_bytes,
                webp_bytes,
            }) => {
                report.converted_local += 1;
                if !quiet {
                    println!(
                        "   Converted local file to {}: {}",
                        record.photo_filename(),
                        describe_saving(original_bytes, webp_bytes)
                    );
                }
            }
            Ok(PhotoOutcome::AlreadyPresent) => {
                report.already_present += 1;
                if !quiet {
                    println!("   Already present: {}", record.photo_filename());
                }
            }
            Ok(PhotoOutcome::NoLink) => {
                eprintln!("   No photo link for {} (row {})", record.name, record.index);
                report.no_link.push(record.name.clone());
            }
            Err(e) => {
                eprintln!("   Photo failed for {} (row {}): {}", record.name, record.index, e);
                report.failed.push((record.name.clone(), e));
            }
        }
    }

    report.cleaned = remove_stale_sources(&config.output_dir)?;
    report.total_webp_bytes = records
        .iter()
        .map(|r| file_len(&webp_path(&config.output_dir, r)))
        .sum();

    Ok(report)
}

pub fn print_report(report: &PhotoReport) {
    println!();
    println!("Photos: {} ready", report.succeeded());
    println!("  Downloaded:        {}", report.downloaded);
    println!("  Converted locally: {}", report.converted_local);
    println!("  Already present:   {}", report.already_present);
    println!("  Old files removed: {}", report.cleaned);
    println!(
        "  WebP on disk:      {} bytes ({:.1} MB)",
        report.total_webp_bytes,
        report.total_webp_bytes as f64 / 1024.0 / 1024.0
    );
    if !report.no_link.is_empty() {
        println!("  No photo link ({}): {}", report.no_link.len(), report.no_link.join(", "));
    }
    if !report.failed.is_empty() {
        println!("  Failed ({}):", report.failed.len());
        for (name, e) in &report.failed {
            println!("    {}: {}", name, e);
        }
    }
}

/// `images` command: photos for every response, fetched from Drive
pub fn run_images(config: &Config, quiet: bool) -> Result<PhotoReport> {
    let records = crate::responses::load_responses(config)?;
    let client = DriveClient::new(&config.fetch)?;

    println!(
        "Fetching photos for {} responses into {}/",
        records.len(),
        config.output_dir.display()
    );
    let report = process_all(&records, &client, config, quiet)?;
    print_report(&report);
    Ok(report)
}
