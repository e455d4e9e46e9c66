use iced::{
    Alignment, Element, Length, Padding, Size, Task,
    widget::{
        button, column, container, image, mouse_area, radio, row, scrollable, text, text_input,
        tooltip,
    },
    window,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::extractor::{self, ExtractError, Extractor, SizeClass};
use crate::logs;
use crate::save;

const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(7);
const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(500);

pub fn run_ui(source: Option<PathBuf>, size: SizeClass) -> Result<(), Box<dyn std::error::Error>> {
    iced::application("Icon Extractor", update, view)
        .subscription(subscription)
        .window(window::Settings {
            size: Size::new(640.0, 480.0),
            position: window::Position::Centered,
            min_size: Some(Size::new(320.0, 200.0)),
            exit_on_close_request: false,
            ..Default::default()
        })
        .run_with(move || {
            let mut state = AppState::new(size);
            let task = match source {
                Some(path) => state.begin_load(path),
                None => Task::none(),
            };
            (state, task)
        })?;

    Ok(())
}

#[derive(Debug, Clone)]
pub enum Message {
    PathChanged(String),
    Open,
    Extract,
    SizeChanged(SizeClass),
    ThumbnailPressed(usize),
    ClearStatus(u64),
    CloseRequested(window::Id),
}

struct Thumbnail {
    index: usize,
    handle: image::Handle,
}

struct AppState {
    path_input: String,
    size: SizeClass,
    extractor: Option<Extractor>,
    thumbnails: Vec<Thumbnail>,
    status: String,
    status_generation: u64,
    last_press: Option<(usize, Instant)>,
    rng: ChaCha8Rng,
}

impl AppState {
    fn new(size: SizeClass) -> Self {
        Self {
            path_input: String::new(),
            size,
            extractor: None,
            thumbnails: Vec::new(),
            status: String::new(),
            status_generation: 0,
            last_press: None,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Shows the loading text first; extraction runs on the next message.
    fn begin_load(&mut self, path: PathBuf) -> Task<Message> {
        self.path_input = path.display().to_string();
        self.status = "Loading icons...".to_string();
        self.status_generation += 1;
        Task::done(Message::Extract)
    }

    fn reload(&mut self) -> Task<Message> {
        self.release_current();

        let path = PathBuf::from(self.path_input.trim());
        let extractor = match Extractor::new(&path, self.size) {
            Ok(extractor) => extractor,
            Err(e) => {
                logs::log_error(&format!("Failed to load {}: {}", path.display(), e));
                return self.set_status(describe_error(&e));
            }
        };

        self.thumbnails = extractor
            .get_all()
            .enumerate()
            .map(|(index, icon)| Thumbnail {
                index,
                handle: image::Handle::from_rgba(
                    icon.width(),
                    icon.height(),
                    icon.to_rgba_vec(),
                ),
            })
            .collect();

        if extractor.is_empty() {
            self.extractor = Some(extractor);
            return self.set_status("No icons found in that file...".to_string());
        }

        let window_icon = extractor::pick_random_index(&mut self.rng, extractor.len())
            .and_then(|index| extractor.item_at(index).ok())
            .and_then(|icon| {
                window::icon::from_rgba(icon.to_rgba_vec(), icon.width(), icon.height()).ok()
            });

        logs::log_info(&format!(
            "Showing {} of {} {:?} icons from {}",
            extractor.len(),
            extractor.count(),
            extractor.size_class(),
            extractor.icon_source().display()
        ));
        self.extractor = Some(extractor);
        self.status.clear();
        self.status_generation += 1;

        match window_icon {
            Some(icon) => {
                window::get_latest().and_then(move |id| window::change_icon(id, icon.clone()))
            }
            None => Task::none(),
        }
    }

    fn release_current(&mut self) {
        self.thumbnails.clear();
        self.last_press = None;
        if let Some(mut extractor) = self.extractor.take() {
            extractor.release();
        }
    }

    fn set_status(&mut self, message: String) -> Task<Message> {
        self.status = message;
        self.status_generation += 1;
        let generation = self.status_generation;
        Task::perform(
            async { tokio::time::sleep(STATUS_CLEAR_DELAY).await },
            move |_| Message::ClearStatus(generation),
        )
    }

    fn save_icon(&mut self, index: usize) -> Task<Message> {
        let Some(extractor) = &self.extractor else {
            return Task::none();
        };

        let result = extractor
            .item_at(index)
            .map_err(Box::<dyn std::error::Error>::from)
            .and_then(|icon| save::save_bitmap(icon, &save::default_save_dir()));

        match result {
            Ok(path) => self.set_status(saved_message(&path, dirs::desktop_dir().as_deref())),
            Err(e) => {
                logs::log_error(&format!("Failed to save icon {}: {}", index, e));
                self.set_status(format!("Could not save icon: {}", e))
            }
        }
    }
}

fn describe_error(error: &ExtractError) -> String {
    match error {
        ExtractError::ResourceAccess { source, .. } => {
            format!("Cannot open that file: {}", source)
        }
        other => other.to_string(),
    }
}

/// Names the desktop only when the file actually landed there.
fn saved_message(path: &Path, desktop: Option<&Path>) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.parent() {
        Some(dir) if Some(dir) == desktop => format!("File saved as '{}' on your desktop", name),
        Some(dir) => format!("File saved as '{}' in {}", name, dir.display()),
        None => format!("File saved as '{}'", name),
    }
}

fn size_label(name: &str, size: SizeClass) -> String {
    format!("{} ({}x{})", name, size.pixels(), size.pixels())
}

/// True when a press on `index` at `now` completes a double click.
fn is_double_click(last: Option<(usize, Instant)>, index: usize, now: Instant) -> bool {
    matches!(
        last,
        Some((prev, at)) if prev == index && now.duration_since(at) <= DOUBLE_CLICK_WINDOW
    )
}

fn update(state: &mut AppState, message: Message) -> Task<Message> {
    match message {
        Message::PathChanged(value) => {
            state.path_input = value;
            Task::none()
        }

        Message::Open => {
            let path = PathBuf::from(state.path_input.trim());
            if path.as_os_str().is_empty() {
                return Task::none();
            }
            state.begin_load(path)
        }

        Message::Extract => state.reload(),

        Message::SizeChanged(size) => {
            if size == state.size {
                return Task::none();
            }
            state.size = size;
            if state.path_input.trim().is_empty() {
                Task::none()
            } else {
                state.begin_load(PathBuf::from(state.path_input.trim()))
            }
        }

        Message::ThumbnailPressed(index) => {
            let now = Instant::now();
            if is_double_click(state.last_press, index, now) {
                state.last_press = None;
                state.save_icon(index)
            } else {
                state.last_press = Some((index, now));
                Task::none()
            }
        }

        Message::ClearStatus(generation) => {
            if generation == state.status_generation {
                state.status.clear();
            }
            Task::none()
        }

        Message::CloseRequested(id) => {
            state.release_current();
            logs::log_info("Window closed");
            window::close(id)
        }
    }
}

fn subscription(_state: &AppState) -> iced::Subscription<Message> {
    window::close_requests().map(Message::CloseRequested)
}

fn view(state: &AppState) -> Element<'_, Message> {
    let path_bar = row![
        text_input("Path to an .exe, .dll or .ico file", &state.path_input)
            .on_input(Message::PathChanged)
            .on_submit(Message::Open)
            .padding(Padding::from(6))
            .width(Length::Fill),
        button("Open").on_press(Message::Open),
    ]
    .spacing(8)
    .align_y(Alignment::Center);

    let size_picker = row![
        radio(
            size_label("Large", SizeClass::Large),
            SizeClass::Large,
            Some(state.size),
            Message::SizeChanged
        ),
        radio(
            size_label("Small", SizeClass::Small),
            SizeClass::Small,
            Some(state.size),
            Message::SizeChanged
        ),
    ]
    .spacing(16);

    let thumbnails = row(state.thumbnails.iter().map(|thumb| {
        tooltip(
            mouse_area(container(image(thumb.handle.clone())).padding(4))
                .on_press(Message::ThumbnailPressed(thumb.index)),
            text(thumb.index.to_string()),
            tooltip::Position::Bottom,
        )
        .into()
    }))
    .spacing(4)
    .wrap();

    let content = column![
        path_bar,
        size_picker,
        scrollable(container(thumbnails).width(Length::Fill)).height(Length::Fill),
        text(&state.status).size(14),
    ]
    .spacing(8)
    .padding(Padding::from(10));

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_click_same_thumbnail() {
        let start = Instant::now();
        let last = Some((3, start));

        assert!(is_double_click(last, 3, start + Duration::from_millis(200)));
        assert!(!is_double_click(last, 4, start + Duration::from_millis(200)));
        assert!(!is_double_click(last, 3, start + Duration::from_millis(900)));
        assert!(!is_double_click(None, 3, start));
    }

    #[test]
    fn test_stale_status_clear_is_ignored() {
        let mut state = AppState::new(SizeClass::Large);
        let _ = state.set_status("first".to_string());
        let stale = state.status_generation;
        let _ = state.set_status("second".to_string());

        let _ = update(&mut state, Message::ClearStatus(stale));
        assert_eq!(state.status, "second");

        let current = state.status_generation;
        let _ = update(&mut state, Message::ClearStatus(current));
        assert!(state.status.is_empty());
    }

    #[test]
    fn test_missing_file_reports_no_icons() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(SizeClass::Large);
        state.path_input = dir.path().join("missing.dll").display().to_string();

        let _ = update(&mut state, Message::Extract);

        assert!(state.thumbnails.is_empty());
        assert_eq!(state.status, "No icons found in that file...");
        assert_eq!(state.extractor.as_ref().map(Extractor::count), Some(0));
    }

    // Icons written by the image crate are PNG-encoded; those go through
    // the portable provider.
    #[cfg(not(windows))]
    fn write_ico(dir: &Path) -> PathBuf {
        let path = dir.join("app.ico");
        ::image::RgbaImage::from_pixel(32, 32, ::image::Rgba([0, 90, 200, 255]))
            .save_with_format(&path, ::image::ImageFormat::Ico)
            .unwrap();
        path
    }

    #[cfg(not(windows))]
    #[test]
    fn test_reload_replaces_previous_icons() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(SizeClass::Large);
        state.path_input = write_ico(dir.path()).display().to_string();

        let _ = update(&mut state, Message::Extract);
        assert_eq!(state.thumbnails.len(), 1);
        assert!(state.status.is_empty());

        state.last_press = Some((0, Instant::now()));
        let _ = update(&mut state, Message::Extract);

        assert_eq!(state.thumbnails.len(), 1);
        assert!(state.last_press.is_none());
        let extractor = state.extractor.as_ref().unwrap();
        assert_eq!(extractor.len(), 1);
        assert!(extractor.item_at(0).is_ok());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_reload_of_empty_source_drops_old_icons() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(SizeClass::Large);
        state.path_input = write_ico(dir.path()).display().to_string();
        let _ = update(&mut state, Message::Extract);
        assert_eq!(state.thumbnails.len(), 1);

        state.path_input = dir.path().join("missing.dll").display().to_string();
        let _ = update(&mut state, Message::Extract);

        assert!(state.thumbnails.is_empty());
        assert_eq!(state.extractor.as_ref().map(Extractor::len), Some(0));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_close_releases_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(SizeClass::Large);
        state.path_input = write_ico(dir.path()).display().to_string();
        let _ = update(&mut state, Message::Extract);
        state.last_press = Some((0, Instant::now()));

        let _ = update(&mut state, Message::CloseRequested(window::Id::unique()));

        assert!(state.extractor.is_none());
        assert!(state.thumbnails.is_empty());
        assert!(state.last_press.is_none());
    }

    #[test]
    fn test_saved_message_names_location() {
        let desktop = Path::new("/home/ada/Desktop");

        assert_eq!(
            saved_message(&desktop.join("icon.bmp"), Some(desktop)),
            "File saved as 'icon.bmp' on your desktop"
        );
        assert_eq!(
            saved_message(Path::new("/home/ada/icon(0).bmp"), Some(desktop)),
            "File saved as 'icon(0).bmp' in /home/ada"
        );
        assert_eq!(
            saved_message(Path::new("/home/ada/icon.bmp"), None),
            "File saved as 'icon.bmp' in /home/ada"
        );
    }

    #[test]
    fn test_open_sets_loading_status() {
        let mut state = AppState::new(SizeClass::Large);
        let _ = update(&mut state, Message::PathChanged("  some.dll ".to_string()));
        let _ = update(&mut state, Message::Open);

        assert_eq!(state.status, "Loading icons...");
        assert_eq!(state.path_input, "some.dll");
    }
}
