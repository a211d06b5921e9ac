//! `/connect`: a pairing page with the connect URL as a QR code

use qrcode::render::svg;
use qrcode::QrCode;
use url::Url;

use panorama_utils::{PanoramaError, Result};

/// URL a remote client opens, with `token` embedded.
///
/// `public_url` wins over the listen address.
pub fn connect_url(public_url: Option<&str>, listen: &str, token: &str) -> Result<Url> {
    let base = match public_url {
        Some(url) => url.to_string(),
        None => format!("http://{}/", listen),
    };
    let mut url = Url::parse(&base)
        .map_err(|e| PanoramaError::config(format!("invalid connect URL {}: {}", base, e)))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

/// SVG rendering of `data` as a QR code
pub fn qr_svg(data: &str) -> Result<String> {
    let code = QrCode::new(data.as_bytes())
        .map_err(|e| PanoramaError::internal(format!("QR encoding failed: {}", e)))?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build())
}

/// The pairing page
pub fn connect_page(url: &Url) -> Result<String> {
    let svg = qr_svg(url.as_str())?;
    let link = html_escape(url.as_str());
    Ok(format!(
        "<!doctype html>\n\
         <html><head><meta charset=\"utf-8\"><title>panorama</title></head>\n\
         <body style=\"font-family: sans-serif; text-align: center\">\n\
         <h1>Connect to panorama</h1>\n\
         {svg}\n\
         <p><a href=\"{link}\">{link}</a></p>\n\
         </body></html>\n",
        svg = svg,
        link = link,
    ))
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
