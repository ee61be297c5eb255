/// Settings shared by every request a `Codec` handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Largest request body accepted, in bytes. `None` leaves the bound to the transport.
    pub max_body_size: Option<u64>,
    /// Initial capacity of each pooled encode buffer.
    pub buffer_capacity: usize,
    /// Number of encode buffers kept around between requests.
    pub pool_size: usize,
}

impl Default for CodecConfig {
    fn default() -> CodecConfig {
        CodecConfig {
            max_body_size: None,
            buffer_capacity: 1024,
            pool_size: 32,
        }
    }
}
