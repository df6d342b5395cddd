//! CLI `doctor` command: print a configuration report.

use galaxy::config::{default_config_path, GalaxyConfig};
use galaxy::embedding::local::model_paths;
use galaxy::embedding::EmbeddingMethod;

pub fn doctor(config: &GalaxyConfig) {
    let set = |v: &Option<String>| if v.is_some() { "set" } else { "not set" };

    println!("Galaxy Configuration Report");
    println!("===========================");
    println!();
    println!("Config file:       {}", default_config_path().display());
    println!("GitHub API:        {}", config.github.api_url);
    println!("GitHub token:      {}", set(&config.github.token));
    println!("Gemini API key:    {}", set(&config.embedding.gemini_api_key));
    println!("Embedding method:  {}", config.embedding.method);
    println!(
        "Reduction:         {} (perplexity ≤ {}, {} iterations)",
        config.reduction.method, config.reduction.perplexity, config.reduction.max_iter
    );
    println!();

    let (model, tokenizer) = model_paths(&config.embedding);
    let present = |p: &std::path::Path| if p.exists() { "present" } else { "missing" };
    println!("Local model ({}):", config.embedding.local_model);
    println!("  {:<16} {}", present(&model), model.display());
    println!("  {:<16} {}", present(&tokenizer), tokenizer.display());
    if config.embedding.method().ok() == Some(EmbeddingMethod::Local)
        && !(model.exists() && tokenizer.exists())
    {
        println!("  Run `galaxy model download` to fetch it.");
    }
    println!();

    let errors = config.validate();
    if errors.is_empty() {
        println!("Status:            OK");
    } else {
        println!("Status:            {} problem(s)", errors.len());
        for e in errors {
            println!("  - {e}");
        }
    }
}
