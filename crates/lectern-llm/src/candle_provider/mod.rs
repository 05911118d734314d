pub mod embed;
pub mod generate;
pub mod loader;

pub use candle_core::Device;

pub use self::embed::BertEmbedder;
pub use self::generate::T5Generator;
pub use self::loader::{ModelFiles, ModelSource, device_from_name};
