//! The `adaptest init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("adaptest.toml").exists() {
        println!("adaptest.toml already exists, skipping.");
    } else {
        std::fs::write("adaptest.toml", SAMPLE_CONFIG)?;
        println!("Created adaptest.toml");
    }

    std::fs::create_dir_all("banks")?;
    let example_path = std::path::Path::new("banks/example.json");
    if example_path.exists() {
        println!("banks/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)?;
        println!("Created banks/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Run: adaptest validate");
    println!("  2. Run: adaptest next --examinee alice --course rust --assignment example");
    println!(
        "  3. Run: adaptest submit --examinee alice --course rust --assignment example \\\n          --answered 3 --responses 1"
    );

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# adaptest configuration

bank_dir = "./banks"
data_dir = "./adaptest-data"

[engine]
top_k = 3
smoothing_alpha = 0.2
max_swap_attempts = 5
# seed = 42

[engine.estimator]
min_history = 2
theta_min = -4.0
theta_max = 4.0
"#;

const EXAMPLE_BANK: &str = r#"[
  {
    "id": 1,
    "question": "Which keyword introduces an immutable binding?",
    "options": ["A) let", "B) mut", "C) static", "D) var"],
    "answer": "A) let",
    "difficulty": "Easy",
    "param_a": 0.8,
    "param_b": -2.0,
    "param_c": 0.25
  },
  {
    "id": 2,
    "question": "What is the type of a string literal?",
    "options": ["A) String", "B) &'static str", "C) char", "D) Vec<u8>"],
    "answer": "B) &'static str",
    "difficulty": "Easy",
    "param_a": 1.0,
    "param_b": -1.0,
    "param_c": 0.25
  },
  {
    "id": 3,
    "question": "Which trait lets a value be duplicated implicitly on assignment?",
    "options": ["A) Clone", "B) Copy", "C) Default", "D) Send"],
    "answer": "B) Copy",
    "difficulty": "Medium",
    "param_a": 1.2,
    "param_b": 0.0,
    "param_c": 0.2
  },
  {
    "id": 4,
    "question": "What does the ? operator do on an Err value?",
    "options": ["A) Panics", "B) Returns it early from the function", "C) Ignores it", "D) Retries"],
    "answer": "B) Returns it early from the function",
    "difficulty": "Medium",
    "param_a": 1.4,
    "param_b": 0.5,
    "param_c": 0.2
  },
  {
    "id": 5,
    "question": "Which smart pointer gives shared ownership across threads?",
    "options": ["A) Rc", "B) Box", "C) Arc", "D) Cell"],
    "answer": "C) Arc",
    "difficulty": "Medium",
    "param_a": 1.1,
    "param_b": 1.0,
    "param_c": 0.2
  },
  {
    "id": 6,
    "question": "Which lifetime elision rule applies to methods taking &self?",
    "options": ["A) Output borrows from self", "B) Output is 'static", "C) No elision", "D) Output borrows from the first argument after self"],
    "answer": "A) Output borrows from self",
    "difficulty": "Hard",
    "param_a": 1.6,
    "param_b": 1.8,
    "param_c": 0.15
  },
  {
    "id": 7,
    "question": "What makes a type !Unpin?",
    "options": ["A) Containing PhantomPinned", "B) Implementing Drop", "C) Being Sized", "D) Being Copy"],
    "answer": "A) Containing PhantomPinned",
    "difficulty": "Hard",
    "param_a": 1.3,
    "param_b": 2.5,
    "param_c": 0.1
  },
  {
    "id": 8,
    "question": "Draft question awaiting calibration",
    "options": ["A) yes", "B) no"],
    "answer": "A) yes",
    "difficulty": "Medium"
  }
]
"#;
