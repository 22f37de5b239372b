//! HTML pages for the upload form and the prediction result

use anyhow::Result;
use handlebars::{Handlebars, handlebars_helper};
use serde_json::json;

use crate::vision::Classification;

const LAYOUT_HEAD: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Fruit classifier</title>
<style>
body { font-family: sans-serif; max-width: 40rem; margin: 2rem auto; padding: 0 1rem; }
.error { color: #b00020; }
.bar { background: #4caf50; height: 0.8rem; }
table { width: 100%; border-collapse: collapse; }
td { padding: 0.25rem; }
</style>
</head>
<body>
"#;

const INDEX_TEMPLATE: &str = r#"{{> head}}
<h1>Fruit classifier</h1>
{{#if error}}<p class="error">{{error}}</p>{{/if}}
<p>Upload a photo of one of: {{#each classes}}{{capitalize this}}{{#unless @last}}, {{/unless}}{{/each}}.</p>
<form action="/predict" method="post" enctype="multipart/form-data">
  <input type="file" name="file" accept=".png,.jpg,.jpeg">
  <button type="submit">Classify</button>
</form>
<p><small>png, jpg or jpeg up to {{max_mb}} MB</small></p>
</body>
</html>
"#;

const RESULT_TEMPLATE: &str = r#"{{> head}}
<h1>{{capitalize label}}</h1>
<p>Confidence: {{confidence}}%</p>
<img src="data:image/png;base64,{{image}}" alt="{{filename}}" width="128" height="128">
<table>
{{#each probabilities}}
  <tr>
    <td>{{capitalize label}}</td>
    <td>{{percent}}%</td>
    <td><div class="bar" style="width: {{percent}}%"></div></td>
  </tr>
{{/each}}
</table>
<p><a href="/">Classify another image</a></p>
</body>
</html>
"#;

handlebars_helper!(capitalize: |s: str| {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    }
});

pub struct Pages {
    registry: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_helper("capitalize", Box::new(capitalize));
        registry.register_partial("head", LAYOUT_HEAD)?;
        registry.register_template_string("index", INDEX_TEMPLATE)?;
        registry.register_template_string("result", RESULT_TEMPLATE)?;
        Ok(Self { registry })
    }

    /// The upload form, optionally with an error from the last attempt.
    pub fn index(&self, classes: &[String], max_mb: usize, error: Option<&str>) -> Result<String> {
        let data = json!({
            "classes": classes,
            "max_mb": max_mb,
            "error": error,
        });
        Ok(self.registry.render("index", &data)?)
    }

    pub fn result(&self, classification: &Classification) -> Result<String> {
        Ok(self.registry.render("result", classification)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{ClassScore, Prediction};

    fn classes() -> Vec<String> {
        vec!["apple".into(), "banana".into()]
    }

    #[test]
    fn test_index_lists_classes() {
        let html = Pages::new().unwrap().index(&classes(), 2, None).unwrap();
        assert!(html.contains("Apple, Banana."));
        assert!(html.contains("up to 2 MB"));
        assert!(!html.contains("class=\"error\""));
    }

    #[test]
    fn test_index_escapes_error() {
        let html = Pages::new()
            .unwrap()
            .index(&classes(), 2, Some("<b>bad</b>"))
            .unwrap();
        assert!(html.contains("&lt;b&gt;bad&lt;/b&gt;"));
    }

    #[test]
    fn test_result_page() {
        let classification = Classification {
            filename: "fruit.png".into(),
            prediction: Prediction {
                label: "banana".into(),
                confidence: 87.5,
                probabilities: vec![
                    ClassScore {
                        label: "apple".into(),
                        percent: 12.5,
                    },
                    ClassScore {
                        label: "banana".into(),
                        percent: 87.5,
                    },
                ],
            },
            image: "iVBORw0KGgo".into(),
        };
        let html = Pages::new().unwrap().result(&classification).unwrap();
        assert!(html.contains("<h1>Banana</h1>"));
        assert!(html.contains("Confidence: 87.5%"));
        assert!(html.contains("<td>Apple</td>"));
        assert!(html.contains("base64,iVBORw0KGgo"));
    }
}
