use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use thiserror::Error;

/// Largest accepted source file (5 MiB)
pub const MAX_SOURCE_BYTES: u64 = 5 * 1024 * 1024;
/// Output width in pixels
pub const TARGET_WIDTH: u32 = 1200;
/// JPEG quality, 80 out of 100
pub const JPEG_QUALITY: u8 = 80;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("File is too large ({size} bytes). Please select an image under 5MB.")]
    TooLarge { size: u64 },
    #[error("Failed to read image file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to process image: {0}")]
    Decode(image::ImageError),
    #[error("Failed to encode image: {0}")]
    Encode(image::ImageError),
    #[error("Image worker stopped before finishing")]
    WorkerGone,
}

/// A downscaled, re-encoded image ready to be stored inline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub encoded_bytes: usize,
}

/// Height after scaling `width x height` to `TARGET_WIDTH`, aspect preserved
pub fn scaled_height(width: u32, height: u32) -> u32 {
    if width == 0 {
        return 1;
    }
    let scaled = (height as f64 * TARGET_WIDTH as f64 / width as f64).round() as u32;
    scaled.max(1)
}

/// Decode, resize to `TARGET_WIDTH` and re-encode as JPEG.
///
/// Sources narrower than the target width are upscaled; there is no
/// upscaling guard. The size ceiling is checked before any decoding.
pub fn normalize_bytes(bytes: &[u8]) -> Result<NormalizedImage, ImageError> {
    let size = bytes.len() as u64;
    if size > MAX_SOURCE_BYTES {
        return Err(ImageError::TooLarge { size });
    }

    let decoded = image::load_from_memory(bytes).map_err(ImageError::Decode)?;
    let height = scaled_height(decoded.width(), decoded.height());
    let resized = decoded
        .resize_exact(TARGET_WIDTH, height, FilterType::Triangle)
        .to_rgb8();

    let mut jpeg = Vec::new();
    resized
        .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY))
        .map_err(ImageError::Encode)?;

    tracing::debug!(
        source_bytes = size,
        encoded_bytes = jpeg.len(),
        width = TARGET_WIDTH,
        height,
        "normalized image"
    );

    Ok(NormalizedImage {
        data_url: format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(&jpeg)),
        width: TARGET_WIDTH,
        height,
        encoded_bytes: jpeg.len(),
    })
}

/// Normalize an image file. The file size is checked from metadata so an
/// oversized file is never read.
pub fn normalize_file(path: &Path) -> Result<NormalizedImage, ImageError> {
    let size = fs::metadata(path)?.len();
    if size > MAX_SOURCE_BYTES {
        return Err(ImageError::TooLarge { size });
    }
    let bytes = fs::read(path)?;
    normalize_bytes(&bytes)
}

/// Decode the JPEG bytes back out of a data URL produced by `normalize_bytes`
pub fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
    let encoded = data_url.strip_prefix(DATA_URL_PREFIX)?;
    STANDARD.decode(encoded).ok()
}

pub enum JobStatus {
    Pending,
    Done(Result<NormalizedImage, ImageError>),
}

/// Normalization running on a worker thread.
///
/// Dropping the job discards its result; the worker finishes on its own and
/// its send into the closed channel is ignored.
pub struct ImageJob {
    pub source: PathBuf,
    receiver: Receiver<Result<NormalizedImage, ImageError>>,
}

impl ImageJob {
    pub fn spawn(source: PathBuf) -> Self {
        let (sender, receiver) = mpsc::channel();
        let path = source.clone();
        thread::spawn(move || {
            let _ = sender.send(normalize_file(&path));
        });
        Self { source, receiver }
    }

    pub fn poll(&self) -> JobStatus {
        match self.receiver.try_recv() {
            Ok(result) => JobStatus::Done(result),
            Err(TryRecvError::Empty) => JobStatus::Pending,
            Err(TryRecvError::Disconnected) => JobStatus::Done(Err(ImageError::WorkerGone)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, RgbaImage};
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 255) as u8, (y % 255) as u8, 128]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_scaled_height_preserves_aspect() {
        assert_eq!(scaled_height(2400, 1600), 800);
        assert_eq!(scaled_height(600, 300), 600);
        assert_eq!(scaled_height(5000, 1), 1);
    }

    #[test]
    fn test_downscales_wide_image_to_target_width() {
        let result = normalize_bytes(&png_bytes(2400, 1200)).unwrap();
        assert_eq!((result.width, result.height), (1200, 600));
        assert!(result.data_url.starts_with("data:image/jpeg;base64,"));

        let jpeg = decode_data_url(&result.data_url).unwrap();
        assert_eq!(jpeg.len(), result.encoded_bytes);
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1200, 600));
    }

    #[test]
    fn test_narrow_image_is_upscaled() {
        let result = normalize_bytes(&png_bytes(300, 200)).unwrap();
        assert_eq!((result.width, result.height), (1200, 800));
    }

    #[test]
    fn test_alpha_is_flattened() {
        let img = RgbaImage::from_pixel(40, 20, image::Rgba([10, 20, 30, 0]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        let result = normalize_bytes(out.get_ref()).unwrap();
        assert_eq!(result.height, 600);
    }

    #[test]
    fn test_oversized_input_is_rejected_before_decoding() {
        // A decodable PNG padded past the ceiling: decoders ignore trailing
        // bytes, so only the size check can reject it.
        let mut bytes = png_bytes(10, 10);
        bytes.resize(MAX_SOURCE_BYTES as usize + 1, 0);
        match normalize_bytes(&bytes) {
            Err(ImageError::TooLarge { size }) => assert_eq!(size, MAX_SOURCE_BYTES + 1),
            other => panic!("expected TooLarge, got {:?}", other.map(|r| r.width)),
        }
    }

    #[test]
    fn test_exactly_at_ceiling_is_accepted_by_size_check() {
        let bytes = vec![0u8; MAX_SOURCE_BYTES as usize];
        // Passes the size gate and then fails to decode
        assert!(matches!(normalize_bytes(&bytes), Err(ImageError::Decode(_))));
    }

    #[test]
    fn test_corrupt_input_is_decode_error() {
        let result = normalize_bytes(b"definitely not an image");
        assert!(matches!(result, Err(ImageError::Decode(_))));
    }

    #[test]
    fn test_normalize_file_checks_size_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        let file = fs::File::create(&path).unwrap();
        file.set_len(MAX_SOURCE_BYTES + 10).unwrap();
        assert!(matches!(normalize_file(&path), Err(ImageError::TooLarge { .. })));

        let missing = dir.path().join("missing.png");
        assert!(matches!(normalize_file(&missing), Err(ImageError::Read(_))));
    }

    #[test]
    fn test_job_reports_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        fs::write(&path, png_bytes(600, 400)).unwrap();

        let job = ImageJob::spawn(path);
        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            match job.poll() {
                JobStatus::Pending => {
                    assert!(Instant::now() < deadline, "image job timed out");
                    thread::sleep(Duration::from_millis(5));
                }
                JobStatus::Done(result) => {
                    assert_eq!(result.unwrap().height, 800);
                    break;
                }
            }
        }
    }

    #[test]
    fn test_dropped_job_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        fs::write(&path, png_bytes(50, 50)).unwrap();
        let job = ImageJob::spawn(path);
        drop(job);
    }
}
