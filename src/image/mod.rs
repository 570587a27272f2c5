pub mod color;
pub mod io;
pub mod rect;

pub use self::color::ColorImage;
pub use self::rect::Rect;
