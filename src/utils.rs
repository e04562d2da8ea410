use crate::twilio_types::{wrap_twiml, Response};

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use tracing::trace;

pub fn render_twiml(response: Response) -> String {
    let twiml = wrap_twiml(xmlserde::xml_serialize(response));
    trace!("twiml: '{}'", twiml);
    twiml
}

/// Webhook reply: always 200 with an xml body, whatever happened while handling the callback.
pub fn twiml_response(response: Response) -> (StatusCode, HeaderMap, String) {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    (StatusCode::OK, headers, render_twiml(response))
}
