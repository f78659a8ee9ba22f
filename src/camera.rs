// Camera-backed media source over nokhwa.
// `acquire` opens the device on the capture thread; `next_frame` converts each
// frame to 0x00RRGGBB so the compositor can sample it directly.

use crate::error::Error;
use crate::media::{FacingMode, MediaCapture, MediaSource, StreamConstraints};
use crate::types::FrameBuffer;

use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

use image::{ImageBuffer, Rgb};

/// Which device to open. Crosses to the capture thread; the camera itself never does.
pub struct CameraSource {
    index: u32, // 0 = default webcam
}

impl CameraSource {
    pub fn new(index: u32) -> Self {
        Self { index }
    }
}

impl MediaSource for CameraSource {
    /// Open the camera at the closest format to the ideal resolution.
    fn acquire(
        self: Box<Self>,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaCapture>, Error> {
        if constraints.facing_mode != FacingMode::User {
            // Desktop devices don't report which way they face.
            tracing::debug!(facing = ?constraints.facing_mode, "facing mode is advisory");
        }
        Ok(Box::new(CameraCapture::open(self.index, constraints)?))
    }

    fn label(&self) -> String {
        format!("camera {}", self.index)
    }
}

// A small wrapper around nokhwa::Camera so the capture loop stays clean.
pub struct CameraCapture {
    cam: Camera,
    width: u32,  // actual width the device delivers
    height: u32, // actual height the device delivers
}

impl CameraCapture {
    /// Open device `index` near the ideal resolution and start streaming.
    /// Visual: nothing changes on screen yet; the reflections stay blank until the first frame.
    pub fn open(index: u32, constraints: &StreamConstraints) -> Result<Self, Error> {
        // 1) Choose the device
        let idx = CameraIndex::Index(index);

        // 2) Describe the ideal format; the driver picks the closest it supports.
        let fmt = CameraFormat::new(
            Resolution::new(constraints.ideal_width, constraints.ideal_height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            30,                // target FPS
        );
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        // 3) Create the camera (fails if no device exists or access is refused).
        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;
        // 4) Start streaming frames.
        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // 5) The device may pick a slightly different resolution.
        let actual = cam.resolution();
        tracing::info!(index, width = actual.width(), height = actual.height(), "camera stream opened");
        Ok(Self { cam, width: actual.width(), height: actual.height() })
    }
}

impl MediaCapture for CameraCapture {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Blocks until the camera has a new frame.
    fn next_frame(&mut self) -> Result<FrameBuffer, Error> {
        // 1) Pull a raw frame (blocks until the device has one).
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;
        // 2) Decode whatever the device sent into RGB8.
        let rgb_img = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;
        // 3) Pack as 0x00RRGGBB for the compositor.
        Ok(pack_rgb(&rgb_img))
    }

    fn release(&mut self) {
        if let Err(e) = self.cam.stop_stream() {
            tracing::warn!(error = %e, "failed to stop camera stream");
        }
    }
}

/// RGB8 image to packed 0x00RRGGBB pixels.
fn pack_rgb(img: &ImageBuffer<Rgb<u8>, Vec<u8>>) -> FrameBuffer {
    let (w, h) = img.dimensions();
    let pixels = img
        .pixels()
        .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
        .collect();
    FrameBuffer { width: w as usize, height: h as usize, pixels }
}
