use crate::error::Result;
use crate::img::RawImage;
use pixels::{Pixels, SurfaceTexture};
use std::cmp::{max, min};
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder},
};

const MAX_WINDOW_WIDTH: u32 = 1500;
const MAX_WINDOW_HEIGHT: u32 = 1000;

pub struct Gfx {
    pub window: Window,
    pixels: Pixels,
}

impl Gfx {
    pub fn new(width: u32, height: u32, title: &str) -> Result<(Self, EventLoop<()>)> {
        // integer upscale for small images, never below 1:1
        let pixel_scale = max(
            1,
            min(MAX_WINDOW_HEIGHT / height, MAX_WINDOW_WIDTH / width),
        );
        let event_loop = EventLoop::new();
        let physical_size = PhysicalSize::new(width * pixel_scale, height * pixel_scale);

        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(physical_size)
            .with_resizable(false)
            .build(&event_loop)?;

        // the surface spans the whole window, the pixel buffer stays width x height
        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, &window);
        let pixels = Pixels::new(width, height, surface_texture)?;

        Ok((Gfx { window, pixels }, event_loop))
    }

    pub fn render(&mut self) -> Result<()> {
        self.pixels.render()?;
        Ok(())
    }

    pub fn draw(&mut self, img: &RawImage) {
        self.pixels.frame_mut().copy_from_slice(&img.pixels);
    }
}

/// Show `img` in a window until it is closed. Never returns on success.
pub fn show(img: &RawImage, title: &str) -> Result<()> {
    let (mut gfx, event_loop) = Gfx::new(img.width, img.height, title)?;
    gfx.draw(img);
    gfx.render()?;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => *control_flow = ControlFlow::Exit,
            Event::RedrawRequested(id) if id == gfx.window.id() => {
                if let Err(e) = gfx.render() {
                    log::error!("{:#}", anyhow::Error::from(e));
                    *control_flow = ControlFlow::Exit;
                }
            }
            _ => {}
        }
    })
}
