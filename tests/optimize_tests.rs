//! Tests for singlefile-pack optimizer

use singlefile_pack::{optimize, Optimizer, MAX_PASSES};

const SAMPLES: &[&str] = &[
    "",
    "   ",
    "<p>plain</p>",
    "<html>\n  <head>\n    <!-- c -->\n  </head>\n  <body>  x  </body>\n</html>",
    "<style>/* a */ a { color: red; } /* b */</style>",
    "<script>// a\nvar u = 'http://x.org'; // trailing\n</script>",
    "a //*x*/* y */ b",
    "<!-- <!-- nested --> -->",
    "////\n//\n/**/*/",
    "<a href=\"//cdn.example.com\">  </a>   <b> </b>",
    "line\r\n\r\n\tindent",
    "<!-- unterminated",
];

#[test]
fn test_idempotent() {
    for sample in SAMPLES {
        let once = optimize(sample);
        assert_eq!(optimize(&once), once, "not idempotent for {:?}", sample);

        let quoted = Optimizer::new().normalize_quotes(true);
        let once = quoted.optimize(sample);
        assert_eq!(quoted.optimize(&once), once, "not idempotent for {:?}", sample);
    }
}

#[test]
fn test_never_longer() {
    for sample in SAMPLES {
        assert!(optimize(sample).len() <= sample.len(), "grew: {:?}", sample);
    }
}

#[test]
fn test_document_minification() {
    let input = "<html>\n  <head>\n    <!-- c -->\n  </head>\n  <body>  x  </body>\n</html>";
    assert_eq!(optimize(input), "<html><head></head><body> x </body></html>");
}

#[test]
fn test_external_urls_survive() {
    let input = r#"<link rel="stylesheet" href="https://cdn.example.com/a.css"><script src='https://cdn.example.com/x.js'></script>"#;
    assert_eq!(optimize(input), input);
}

#[test]
fn test_string_literal_limitation() {
    // `//` inside a string literal without a guarding prefix is stripped
    let out = optimize("<script>var s = 'a // b';\nrun();</script>");
    assert_eq!(out, "<script>var s = 'a run();</script>");
}

/// Each level only becomes a comment once the level inside it is removed
fn nested_comments(depth: usize) -> String {
    format!("{}<!---->{}", "<!-".repeat(depth), "- -->".repeat(depth))
}

#[test]
fn test_nested_comment_markers_stop_at_pass_limit() {
    let shallow = nested_comments(MAX_PASSES - 2);
    assert_eq!(optimize(&shallow), "");

    let deep = nested_comments(20_000);
    let out = optimize(&deep);
    assert!(!out.is_empty());
    assert!(out.len() < deep.len());
}
