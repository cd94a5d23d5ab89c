//! Browser-side reload client and HTML injection.

/// Path of the WebSocket endpoint the injected client connects to.
pub const RELOAD_CHANNEL_PATH: &str = "/__live-serve/ws";

/// Client script, inlined into every served HTML page.
const CLIENT_SCRIPT: &str = r#"(function () {
  if (!('WebSocket' in window)) {
    console.warn('[live-serve] WebSocket unsupported, live reload disabled');
    return;
  }
  var proto = window.location.protocol === 'https:' ? 'wss://' : 'ws://';
  var socket = new WebSocket(proto + window.location.host + '__RELOAD_PATH__');

  function refreshStyles(path) {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var matched = false;
    for (var i = 0; i < links.length; i++) {
      var link = links[i];
      var url = new URL(link.href, window.location.href);
      if (url.pathname.replace(/^\//, '') !== path && !url.pathname.endsWith('/' + path)) {
        continue;
      }
      url.searchParams.set('_live_serve', Date.now().toString());
      link.href = url.toString();
      matched = true;
    }
    return matched;
  }

  socket.onmessage = function (msg) {
    var signal;
    try { signal = JSON.parse(msg.data); } catch (e) { return; }
    if (signal.type === 'inject-css') {
      if (!refreshStyles(signal.path)) { window.location.reload(); }
    } else if (signal.type === 'reload') {
      window.location.reload();
    }
  };
  console.log('[live-serve] live reload enabled');
})();"#;

/// The `<script>` tag inserted into HTML responses.
pub fn script_tag() -> String {
    format!(
        "<!-- Code injected by live-serve -->\n<script>\n{}\n</script>\n",
        CLIENT_SCRIPT.replace("__RELOAD_PATH__", RELOAD_CHANNEL_PATH)
    )
}

/// Insert the reload client into an HTML document.
///
/// The tag goes right before the last `</body>` (case-insensitive); pages
/// without one get it appended. Works on raw bytes so documents in other
/// encodings pass through unchanged.
pub fn inject_into_html(html: &[u8]) -> Vec<u8> {
    let tag = script_tag();
    let mut out = Vec::with_capacity(html.len() + tag.len());

    match find_last_ascii_ci(html, b"</body>") {
        Some(idx) => {
            out.extend_from_slice(&html[..idx]);
            out.extend_from_slice(tag.as_bytes());
            out.extend_from_slice(&html[idx..]);
        }
        None => {
            out.extend_from_slice(html);
            out.extend_from_slice(tag.as_bytes());
        }
    }

    out
}

/// Byte offset of the last ASCII-case-insensitive occurrence of `needle`.
fn find_last_ascii_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }

    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}
