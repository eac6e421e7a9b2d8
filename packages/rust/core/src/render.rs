//! Landing-page wrapper for generated marketing content.
//!
//! The model only writes body blocks. [`render_full_page`] places them inside a
//! fixed document: head with Tailwind, Font Awesome and the glass styles, a nav
//! bar with the `EVENT.AI` brand, and a closing footer.

use std::sync::LazyLock;

use regex::Regex;

/// Matches a code-fence marker with an optional language tag.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("valid regex"));

const GLASS_STYLES: &str = r#"    <script src="https://cdn.tailwindcss.com"></script>
    <link href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0/css/all.min.css" rel="stylesheet">
    <link href="https://fonts.googleapis.com/css2?family=Outfit:wght@300;400;700&display=swap" rel="stylesheet">
    <style>
        body { font-family: 'Outfit', sans-serif; background-color: #0f172a; color: white; overflow-x: hidden; }
        .bg-glow {
            position: fixed; top: 0; left: 0; width: 100vw; height: 100vh; z-index: -1;
            background:
                radial-gradient(circle at 15% 50%, rgba(76, 29, 149, 0.4), transparent 25%),
                radial-gradient(circle at 85% 30%, rgba(236, 72, 153, 0.4), transparent 25%);
        }
        .glass-card {
            background: rgba(255, 255, 255, 0.05);
            backdrop-filter: blur(16px);
            -webkit-backdrop-filter: blur(16px);
            border: 1px solid rgba(255, 255, 255, 0.1);
            border-radius: 20px;
            box-shadow: 0 4px 30px rgba(0, 0, 0, 0.1);
        }
        .btn-neon {
            background: linear-gradient(45deg, #ec4899, #8b5cf6);
            border: none;
            color: white;
            padding: 12px 30px;
            border-radius: 50px;
            font-weight: bold;
            transition: all 0.3s ease;
            box-shadow: 0 0 15px rgba(236, 72, 153, 0.5);
        }
        .btn-neon:hover { transform: translateY(-2px); box-shadow: 0 0 25px rgba(139, 92, 246, 0.7); }
        .fade-in { animation: fadeIn 1.5s ease-out; }
        @keyframes fadeIn { from { opacity: 0; transform: translateY(20px); } to { opacity: 1; transform: translateY(0); } }
    </style>"#;

/// Remove every code-fence marker, keeping the fenced content.
pub fn strip_code_fences(text: &str) -> String {
    FENCE_RE.replace_all(text, "").trim().to_string()
}

/// Escape text for use inside HTML element content. Backticks are escaped too
/// so no fence marker can reach the page through the title.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '`' => out.push_str("&#96;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap generated body blocks in the full landing-page document.
pub fn render_full_page(title: &str, body: &str) -> String {
    let title = escape_html(title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
{GLASS_STYLES}
</head>
<body>
    <div class="bg-glow"></div>

    <nav class="flex justify-between items-center p-6 glass-card m-4">
        <div class="text-2xl font-bold tracking-wider bg-clip-text text-transparent bg-gradient-to-r from-pink-500 to-violet-500">
            EVENT.AI
        </div>
        <button class="btn-neon">Pre-Register</button>
    </nav>

    <main class="container mx-auto px-4 fade-in">
{body}
    </main>

    <footer class="text-center text-gray-500 py-10 mt-20 border-t border-gray-800">
        <p>Powered by Agentic Event Intelligence System</p>
    </footer>
</body>
</html>"#
    )
}
