// Core modules implementing the scalar codec, stream framing, and error modeling.
pub mod error;
pub mod measure;
pub mod pipe;
pub mod presence;
pub mod stream;
