use super::method::EngineMethod;

/// The trace processing service hosted behind a worker bridge.
///
/// Requests and responses are opaque bytes. `Err` means the processor crashed:
/// the bridge reports an abort and the worker stops. Failures the caller
/// should handle (bad query text, ...) belong inside the response bytes.
pub trait TraceProcessor: Send + 'static {
    fn handle(&mut self, method: EngineMethod, data: &[u8]) -> Result<Vec<u8>, String>;
}
