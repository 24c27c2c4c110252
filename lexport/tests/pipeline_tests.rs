//! Batch pipeline test suite
//!
//! Generates artifacts from JSON inputs into a scratch directory and checks
//! the files on disk.

use std::fs;
use std::path::PathBuf;

use lexport::style::StyleSheet;
use lexport::{Config, GenerateError, Generator, Lexicon};

const LEXICON: &str = r##"{
  "lexers": [
    {
      "name": "Example",
      "aliases": ["ex", "ex2"],
      "filenames": ["example.ex"],
      "states": {
        "root": [
          {"pattern": "#.*$", "token": "Comment.Single"},
          {"words": ["let", "in"], "suffix": "\\b", "token": "Keyword"},
          {"pattern": "(\\w+)(\\s*)(=)", "groups": ["Name.Variable", "Text", "Operator"]},
          {"pattern": "\"", "token": "String", "next": "string"},
          {"pattern": "(?:(?:(?:A){0,5}){0,5}){0,5}", "groups": []}
        ],
        "string": [
          {"pattern": "\\\\.", "token": "String.Escape"},
          {"pattern": "[^\"\\\\]+", "token": "String"},
          {"pattern": "\"", "token": "String", "next": "#pop"}
        ]
      }
    },
    {
      "name": "Broken Lang",
      "states": {
        "root": [{"pattern": "x", "token": "Name", "next": "missing"}]
      }
    },
    {
      "name": "Visual Thing",
      "aliases": ["vt"],
      "filenames": ["*.vt"],
      "ignore_case": true,
      "states": {
        "root": [{"words": ["end"], "token": "Keyword"}]
      }
    }
  ]
}"##;

const STYLES: &str = r##"{
  "styles": [
    {"name": "Mini", "styles": {"Token": "#ffffff", "Keyword": "bold #ff0000", "Comment": "italic #000000"}},
    {"name": "Odd", "styles": {"Token": "sans #ffffff"}}
  ]
}"##;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lexport-pipeline-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn generator(dir: &PathBuf) -> Generator {
    Generator::new(Config {
        out_dir: dir.clone(),
        ..Config::default()
    })
}

mod languages {
    use super::*;

    #[test]
    fn test_generate_all() {
        let dir = scratch("all");
        let lexicon = Lexicon::from_json(LEXICON).unwrap();
        let report = generator(&dir).generate_langs(&lexicon, &[]).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "Broken Lang");
        assert_eq!(report.skipped_rules.len(), 1);
        assert_eq!(report.written.len(), 3);

        let example = fs::read_to_string(dir.join("example.lang")).unwrap();
        assert_eq!(
            example,
            "# autogenerated from pygments for Example\n\
             Token_Comment_Single start '#'\n\
             Token_Keyword = 'let\\b|in\\b'\n\
             (Token_Name_Variable,Token_Text,Token_Operator) = `(\\w+)(\\s*)(=)`\n\
             # string state\n\
             state Token_String = '\"' begin\n\
             \x20\x20Token_String_Escape = '\\\\.'\n\
             \x20\x20Token_String = '[^\"\\\\]+'\n\
             \x20\x20Token_String = '\"' exit\n\
             end\n"
        );

        let visual = fs::read_to_string(dir.join("visual-thing.lang")).unwrap();
        assert!(visual.contains("Token_Keyword = '[eE][nN][dD]'"));
        assert!(!dir.join("broken-lang.lang").exists());

        let map = fs::read_to_string(dir.join("lang.map")).unwrap();
        for line in [
            "Example = example.lang",
            "example = example.lang",
            "ex = example.lang",
            "ex2 = example.lang",
            "vt = visual-thing.lang",
            "visual thing = visual-thing.lang",
        ] {
            assert!(map.lines().any(|l| l == line), "missing {:?}", line);
        }
        assert!(!map.contains("broken"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_selection_by_alias() {
        let dir = scratch("select");
        let lexicon = Lexicon::from_json(LEXICON).unwrap();
        let report = generator(&dir)
            .generate_langs(&lexicon, &["vt".to_string()])
            .unwrap();
        assert!(report.is_complete());
        assert!(dir.join("visual-thing.lang").exists());
        assert!(!dir.join("example.lang").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_structural_mismatch_halts() {
        let lexicon = Lexicon::from_json(
            r##"{"lexers": [
                {"name": "Outer", "states": {"root": [{"pattern": "<", "token": "Tag"}]}},
                {"name": "Inner", "states": {"root": [{"pattern": "[^<]+", "token": "Other", "next": "#pop"}]}},
                {"name": "Outer+Inner", "delegation": {"root": "Outer", "language": "Inner"}}
            ]}"##,
        )
        .unwrap();
        let dir = scratch("halt");
        let result = generator(&dir).generate_langs(&lexicon, &[]);
        assert!(matches!(result, Err(GenerateError::Halted(_))));
        assert!(!dir.join("lang.map").exists());
        let _ = fs::remove_dir_all(&dir);
    }
}

mod styles {
    use super::*;

    #[test]
    fn test_generate_styles() {
        let dir = scratch("styles");
        let sheet = StyleSheet::from_json(STYLES).unwrap();
        let report = generator(&dir).generate_styles(&sheet).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "Odd");

        let style = fs::read_to_string(dir.join("mini.style")).unwrap();
        assert!(style.starts_with("Token white;\n"));
        assert!(style.contains("Token_Keyword brightorange b;\n"));
        assert!(dir.join("mini_esc256.outlang").exists());
        assert_eq!(
            fs::read_to_string(dir.join("outlang.map")).unwrap(),
            "mini_esc256 = mini_esc256.outlang\n"
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
