//! Shareable result page - a before/after view with link-preview metadata.

use crate::store::PhotoResult;

const PAGE_TITLE: &str = "My Christmas Photo - AI Photo Editor";
const PREVIEW_TITLE: &str = "My Christmas Photo Transformation";
const PREVIEW_DESCRIPTION: &str = "Transform your photos with festive Christmas magic using AI!";

/// Escape HTML special characters to prevent XSS attacks.
fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Generate the public page for a saved result.
///
/// # Arguments
///
/// * `result` - The saved before/after pair
/// * `public_url` - Base URL of this service, used for the canonical page link
pub fn generate_share_html(result: &PhotoResult, public_url: &str) -> String {
    let page_url = format!("{}/result/{}", public_url.trim_end_matches('/'), result.id);

    let page_url = html_escape(&page_url);
    let id = html_escape(&result.id);
    let original_url = html_escape(&result.original_url);
    let generated_url = html_escape(&result.generated_url);

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{PAGE_TITLE}</title>
    <meta name="description" content="Check out my festive Christmas photo transformation!">

    <meta property="og:type" content="website">
    <meta property="og:url" content="{page_url}">
    <meta property="og:title" content="{PREVIEW_TITLE}">
    <meta property="og:description" content="{PREVIEW_DESCRIPTION}">
    <meta property="og:image" content="{generated_url}">
    <meta property="og:image:width" content="1200">
    <meta property="og:image:height" content="630">
    <meta property="og:image:alt" content="Christmas Photo Transformation">

    <meta name="twitter:card" content="summary_large_image">
    <meta name="twitter:title" content="{PREVIEW_TITLE}">
    <meta name="twitter:description" content="{PREVIEW_DESCRIPTION}">
    <meta name="twitter:image" content="{generated_url}">
    <style>
        * {{
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #0f2a1d;
            color: #fdf6e3;
            min-height: 100vh;
            display: flex;
            flex-direction: column;
            align-items: center;
            padding: 32px 16px;
        }}
        h1 {{
            font-size: 28px;
            margin-bottom: 24px;
        }}
        .pair {{
            display: flex;
            flex-wrap: wrap;
            gap: 16px;
            justify-content: center;
            max-width: 1100px;
        }}
        figure {{
            flex: 1 1 400px;
            background: #16382a;
            border-radius: 12px;
            overflow: hidden;
        }}
        figure img {{
            display: block;
            width: 100%;
            height: auto;
        }}
        figcaption {{
            padding: 8px 12px;
            font-size: 14px;
            color: #c9b88f;
        }}
        .actions {{
            margin-top: 24px;
            display: flex;
            gap: 12px;
        }}
        .actions a {{
            color: #0f2a1d;
            background: #e8c547;
            padding: 10px 18px;
            border-radius: 8px;
            text-decoration: none;
            font-weight: 600;
        }}
    </style>
</head>
<body>
    <h1>{PREVIEW_TITLE}</h1>
    <div class="pair">
        <figure>
            <img src="{original_url}" alt="Original photo">
            <figcaption>Before</figcaption>
        </figure>
        <figure>
            <img src="{generated_url}" alt="Christmas version">
            <figcaption>After</figcaption>
        </figure>
    </div>
    <div class="actions">
        <a href="{generated_url}" download="christmas-photo-{id}.jpg">Download</a>
        <a href="/">Create your own</a>
    </div>
</body>
</html>"##
    )
}

/// Page shown for unknown or expired result ids.
pub fn generate_not_found_html() -> String {
    r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Photo Not Found</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #0f2a1d;
            color: #fdf6e3;
            min-height: 100vh;
            display: flex;
            flex-direction: column;
            align-items: center;
            justify-content: center;
            gap: 16px;
        }
        a { color: #e8c547; }
    </style>
</head>
<body>
    <h1>Photo Not Found</h1>
    <p>This photo does not exist or has expired.</p>
    <a href="/">Create your own Christmas photo</a>
</body>
</html>"##
        .to_string()
}
