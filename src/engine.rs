use crate::{
    decode::Track,
    log::{Log, log},
    playback::Playback,
    strerr::Strerr,
};
use sdl2::{
    EventPump, Sdl,
    audio::{AudioDevice, AudioDeviceLockGuard, AudioSpecDesired},
    pixels::Color,
    rect::Rect,
    render::{BlendMode, Canvas},
    surface::Surface,
    ttf::Font,
    video::Window,
};

type Device = AudioDevice<Playback>;

/// Window, canvas and the audio device of the track being played.
pub struct Engine {
    pub sdl_context: Sdl,
    canvas: Canvas<Window>,
    device: Option<Device>,
}

impl Engine {
    pub fn new(title: &str, (width, height): (u32, u32)) -> Result<Self, String> {
        let sdl_context = sdl2::init()?;
        let video_subsystem = sdl_context.video()?;

        let window = video_subsystem
            .window(title, width, height)
            .position_centered()
            .build()
            .strerr()?;

        let mut canvas = window
            .into_canvas()
            .present_vsync()
            .accelerated()
            .build()
            .strerr()?;

        // lane backgrounds and flashes are translucent
        canvas.set_blend_mode(BlendMode::Blend);

        Ok(Self {
            sdl_context,
            canvas,
            device: None,
        })
    }

    pub fn event_pump(&self) -> Result<EventPump, String> {
        self.sdl_context.event_pump()
    }

    pub fn clear(&mut self) {
        self.canvas.set_draw_color(Color::BLACK);
        self.canvas.clear();
    }

    pub fn present(&mut self) {
        self.canvas.present();
    }

    pub fn set_title(&mut self, title: impl AsRef<str>) -> Result<(), String> {
        self.canvas.window_mut().set_title(title.as_ref()).strerr()
    }

    pub fn draw_rect(&mut self, rect: Rect, color: Color) -> Result<(), String> {
        self.canvas.set_draw_color(color);
        self.canvas.fill_rect(rect)
    }

    pub fn draw_surface(&mut self, surface: &Surface, (x, y): (i32, i32)) -> Result<(), String> {
        let texture_creator = self.canvas.texture_creator();
        let texture = surface.as_texture(&texture_creator).strerr()?;
        self.canvas.copy(
            &texture,
            None,
            Rect::new(x, y, surface.width(), surface.height()),
        )
    }

    pub fn draw_text(
        &mut self,
        font: &Font,
        text: &str,
        (x, y): (i32, i32),
        color: Color,
    ) -> Result<(), String> {
        if text.is_empty() {
            return Ok(());
        }

        let surface = font.render(text).blended(color).strerr()?;
        self.draw_surface(&surface, (x, y))
    }

    /// Same as [`Engine::draw_text`] but horizontally centred on `center_x`.
    pub fn draw_text_centered(
        &mut self,
        font: &Font,
        text: &str,
        (center_x, y): (i32, i32),
        color: Color,
    ) -> Result<(), String> {
        let (width, _) = font.size_of(text).strerr()?;
        self.draw_text(font, text, (center_x - width as i32 / 2, y), color)
    }

    /// Replaces the current device with one playing `track` from the start.
    pub fn open(&mut self, track: &Track, volume: f32) -> Result<(), String> {
        self.close();
        self.device = Some(self.load_device(track, volume)?);
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(device) = self.device.take() {
            device.pause();
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        if let Some(device) = self.device.as_ref() {
            if paused {
                device.pause();
            } else {
                device.resume();
            }
        }
    }

    /// Seconds of audio sitting in the device buffer ahead of what is heard.
    pub fn latency(&self) -> f32 {
        self.device.as_ref().map_or(0.0, |device| {
            let spec = device.spec();
            if spec.freq > 0 {
                spec.samples as f32 / spec.freq as f32
            } else {
                0.0
            }
        })
    }

    pub fn lock_device(&mut self) -> Option<AudioDeviceLockGuard<Playback>> {
        self.device.as_mut().map(|device| device.lock())
    }

    fn load_device(&self, track: &Track, volume: f32) -> Result<Device, String> {
        let playback = Playback::new(track, volume);
        let sample_rate = track.sample_rate as i32;
        let channels = u8::try_from(track.channels).strerr()?;
        let desired_spec = AudioSpecDesired {
            freq: Some(sample_rate),
            channels: Some(channels),
            samples: None,
        };
        let device = self
            .sdl_context
            .audio()?
            .open_playback(None, &desired_spec, |_| playback)?;

        let spec = device.spec();
        if spec.freq != sample_rate || spec.channels != channels {
            Err(format!(
                "device wants {} Hz / {} ch, track is {sample_rate} Hz / {channels} ch",
                spec.freq, spec.channels
            ))
        } else {
            log(Log::Debug, format!("audio device open, buffer of {} frames", spec.samples));
            device.resume();
            Ok(device)
        }
    }
}
