/*
 * Responsibility
 * - 拒否時のレスポンス生成 (status / content-type / body)
 * - body の encoding は Marshaller として差し替え可能
 */
pub mod marshaller;
pub mod writer;

pub use marshaller::{JsonMarshaller, MarshalError, Marshalled, Marshaller, PlainTextMarshaller, ResponseFormat};
pub use writer::ResponseWriter;
