//! Prompt builder and output schema for scene generation.
//!
//! Everything here is pure: the prompt is a filled template and the schema is a
//! JSON literal. The model call lives in `generation`.

use serde_json::{json, Value};

use crate::catalog::{Difficulty, Language};
use crate::util::{fill_template, truncate_chars};

/// Longest page-text prefix embedded in a prompt, in characters.
pub const MAX_PAGE_CHARS: usize = 4000;

/// One complete, schema-valid result shown to the model as the target shape.
pub const GOLDEN_EXAMPLE: &str = r##"[
  {
    "theme": "Lili's Great Germ Adventure",
    "summary": "Join Lili, the brave Health Hero, on a mission to find and defeat sneaky germs to stay healthy and strong!",
    "main_doodle_svg": "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 100 100'><circle cx='50' cy='40' r='20' fill='#ffd166'/><rect x='35' y='60' width='30' height='30' rx='6' fill='#06d6a0'/><circle cx='80' cy='20' r='8' fill='#8338ec'/></svg>",
    "doodle_description": "Brave Lili uses her super soap to fight off a sneaky germ!",
    "hotspots": [
      {
        "hotspot_doodle_svg": "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 40 40'><rect x='8' y='14' width='24' height='14' rx='4' fill='#caf0f8'/><circle cx='30' cy='10' r='4' fill='#90e0ef'/></svg>",
        "pop_up_text": "Super Soap!",
        "description": "This is our number one weapon! Its bubbles break down the germs, making them easy to wash away.",
        "isValid": true
      },
      {
        "hotspot_doodle_svg": "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 40 40'><polygon points='20,4 36,36 4,36' fill='#f4a261'/><circle cx='18' cy='24' r='3' fill='#e63946'/></svg>",
        "pop_up_text": "Pizza Party!",
        "description": "Eating pizza is fun, but it does not help us fight germs! This silly step is not part of our Germ Adventure.",
        "isValid": false
      },
      {
        "hotspot_doodle_svg": "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 40 40'><path d='M20 4 C10 18 10 30 20 36 C30 30 30 18 20 4 Z' fill='#4cc9f0'/></svg>",
        "pop_up_text": "Rushing Water!",
        "description": "Water rinses the germs off our hands and sends them down the drain for good.",
        "isValid": true
      },
      {
        "hotspot_doodle_svg": "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 40 40'><rect x='10' y='10' width='8' height='22' rx='4' fill='#ffb4a2'/><rect x='22' y='10' width='8' height='22' rx='4' fill='#ffb4a2'/></svg>",
        "pop_up_text": "Clean Hands!",
        "description": "After washing, our hands are sparkling clean and germ-free, keeping us healthy for more adventures!",
        "isValid": true
      },
      {
        "hotspot_doodle_svg": "<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 40 40'><rect x='4' y='12' width='32' height='16' rx='8' fill='#6d6875'/><circle cx='28' cy='20' r='3' fill='#ffcdb2'/></svg>",
        "pop_up_text": "Video Games!",
        "description": "Playing video games is a great way to have fun, but it is not a step in our germ-fighting quest! This is an imposter.",
        "isValid": false
      }
    ]
  }
]"##;

/// Default instruction template. Placeholders are filled by [`build_prompt_with`].
pub const DEFAULT_TEMPLATE: &str = r#"CRITICAL INSTRUCTIONS: You are an assistant that creates fun, educational adventures illustrated with simple SVG doodles, including some silly, unrelated steps to make it a game. Your ONLY job is to generate a valid JSON array.

---
**PART 1: THE NON-NEGOTIABLE RULES**
1. JSON FORMATTING: Your entire output MUST be a valid JSON array.
2. DOODLES: 'main_doodle_svg' and every 'hotspot_doodle_svg' MUST be a single small, self-contained <svg> element using basic shapes and flat colors.
3. VALIDITY PROPERTY: Each hotspot MUST have an 'isValid' property, which is a boolean (true or false). You MUST include some hotspots where 'isValid' is false.
4. LANGUAGE: Write every 'theme', 'summary', 'doodle_description', 'pop_up_text' and 'description' in {language_name} (language code "{language_code}").
5. AUDIENCE: Difficulty is {difficulty}. Write for readers aged {age_range}; match vocabulary, tone and complexity to that age.
6. FINAL OUTPUT: Your response MUST BE ONLY THE RAW JSON TEXT. Do not include markdown fences or any explanations.

---
**PART 2: THE GOLDEN EXAMPLE (This is what a perfect result looks like)**
{golden_example}

---
**PART 3: YOUR TASK**
1. Read the following text carefully.
2. Create a 'theme', a 'summary', a 'main_doodle_svg' and a 'doodle_description'.
3. Generate exactly {hotspot_count} hotspots based on the theme. Crucially, exactly {invalid_count} of these hotspots MUST be silly and unrelated to the theme, with 'isValid' set to false. The other {valid_count} MUST be genuine steps with 'isValid' set to true.
4. For each hotspot, create a 'pop_up_text' (unique within the scene), a 'hotspot_doodle_svg' and a 'description'.
5. For INVALID hotspots (isValid: false), the 'description' MUST explain WHY that step is silly and does not belong in the adventure.
6. Combine everything into a single JSON array, following all the rules and the style of the Golden Example.

TEXT TO ANALYZE: """{page_text}"""
"#;

/// Placeholders a template must carry for the counts and page text to reach the model.
pub const REQUIRED_PLACEHOLDERS: [&str; 3] = ["page_text", "hotspot_count", "invalid_count"];

/// Required placeholders absent from `template`.
pub fn missing_placeholders(template: &str) -> Vec<&'static str> {
  REQUIRED_PLACEHOLDERS
    .into_iter()
    .filter(|key| !template.contains(&format!("{{{}}}", key)))
    .collect()
}

/// Build the instruction prompt with the default template and the 4000-char bound.
#[allow(dead_code)]
pub fn build_prompt(page_text: &str, difficulty: Difficulty, language: Language) -> String {
  build_prompt_with(DEFAULT_TEMPLATE, MAX_PAGE_CHARS, page_text, difficulty, language)
}

/// Build the instruction prompt from `template`, embedding at most `max_chars`
/// characters of `page_text`.
pub fn build_prompt_with(
  template: &str,
  max_chars: usize,
  page_text: &str,
  difficulty: Difficulty,
  language: Language,
) -> String {
  let hotspots = difficulty.hotspot_count();
  let invalid = difficulty.distractor_count();
  let hotspot_count = hotspots.to_string();
  let invalid_count = invalid.to_string();
  let valid_count = (hotspots - invalid).to_string();

  fill_template(
    template,
    &[
      ("page_text", truncate_chars(page_text, max_chars)),
      ("hotspot_count", &hotspot_count),
      ("invalid_count", &invalid_count),
      ("valid_count", &valid_count),
      ("language_code", language.code()),
      ("language_name", language.description()),
      ("difficulty", difficulty.description()),
      ("age_range", difficulty.age_range()),
      ("golden_example", GOLDEN_EXAMPLE),
    ],
  )
}

/// JSON Schema passed to the model as a response constraint: an array of scenes.
pub fn output_schema() -> Value {
  json!({
    "type": "array",
    "items": {
      "type": "object",
      "properties": {
        "theme": { "type": "string" },
        "summary": { "type": "string" },
        "main_doodle_svg": { "type": "string" },
        "doodle_description": { "type": "string" },
        "hotspots": {
          "type": "array",
          "items": {
            "type": "object",
            "properties": {
              "hotspot_doodle_svg": { "type": "string" },
              "pop_up_text": { "type": "string" },
              "description": { "type": "string" },
              "isValid": { "type": "boolean" }
            },
            "required": ["hotspot_doodle_svg", "pop_up_text", "description", "isValid"]
          }
        }
      },
      "required": ["theme", "summary", "main_doodle_svg", "doodle_description", "hotspots"]
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Scene;

  #[test]
  fn counts_are_embedded_for_every_difficulty() {
    for d in Difficulty::ALL {
      let p = build_prompt("Some page.", d, Language::En);
      assert!(p.contains(&format!("exactly {} hotspots", d.hotspot_count())), "{:?}", d);
      assert!(p.contains(&format!("exactly {} of these hotspots", d.distractor_count())), "{:?}", d);
      assert!(p.contains(d.age_range()));
    }
  }

  #[test]
  fn language_code_is_embedded() {
    let p = build_prompt("Hola.", Difficulty::Medium, Language::Es);
    assert!(p.contains("language code \"es\""));
    assert!(p.contains("Spanish"));
  }

  #[test]
  fn long_page_text_is_bounded() {
    let page = "x".repeat(MAX_PAGE_CHARS + 500);
    let p = build_prompt(&page, Difficulty::Easy, Language::En);
    let embedded = format!("\"\"\"{}\"\"\"", "x".repeat(MAX_PAGE_CHARS));
    assert!(p.contains(&embedded));
    assert!(!p.contains(&"x".repeat(MAX_PAGE_CHARS + 1)));
  }

  #[test]
  fn short_page_text_is_kept_whole() {
    let p = build_prompt("A short article about bees.", Difficulty::Hard, Language::Ja);
    assert!(p.contains("\"\"\"A short article about bees.\"\"\""));
  }

  #[test]
  fn page_text_placeholders_are_not_expanded() {
    let p = build_prompt("{hotspot_count} {golden_example}", Difficulty::Easy, Language::En);
    assert!(p.contains("\"\"\"{hotspot_count} {golden_example}\"\"\""));
  }

  #[test]
  fn golden_example_matches_schema_shape() {
    let scenes: Vec<Scene> = serde_json::from_str(GOLDEN_EXAMPLE).unwrap();
    assert_eq!(scenes.len(), 1);
    assert_eq!(scenes[0].hotspots.len(), Difficulty::Easy.hotspot_count());
    assert_eq!(scenes[0].invalid_count(), Difficulty::Easy.distractor_count());
    assert!(build_prompt("", Difficulty::Easy, Language::En).contains("Lili's Great Germ Adventure"));
  }

  #[test]
  fn default_template_has_every_required_placeholder() {
    assert!(missing_placeholders(DEFAULT_TEMPLATE).is_empty());
    assert_eq!(missing_placeholders("Make {hotspot_count} hotspots"), vec!["page_text", "invalid_count"]);
  }

  #[test]
  fn schema_requires_every_hotspot_field() {
    let schema = output_schema();
    let required = &schema["items"]["properties"]["hotspots"]["items"]["required"];
    for field in ["hotspot_doodle_svg", "pop_up_text", "description", "isValid"] {
      assert!(required.as_array().unwrap().iter().any(|v| v == field), "{}", field);
    }
    assert_eq!(schema["type"], "array");
  }
}
