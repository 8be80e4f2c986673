//! Explain a fuzzy match decision between two names
//! Usage: score-names <name_a> <name_b>

use vault_reconcile::normalize::normalize_name;
use vault_reconcile::scoring::{is_match, normalized_similarity, MATCH_THRESHOLD};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: score-names <name_a> <name_b>");
        std::process::exit(1);
    }

    let a_norm = normalize_name(&args[1]);
    let b_norm = normalize_name(&args[2]);

    if a_norm.is_empty() || b_norm.is_empty() {
        println!("{:?} -> {:?}", args[1], a_norm);
        println!("{:?} -> {:?}", args[2], b_norm);
        println!("At least one name normalizes to nothing; never a fuzzy match.");
        return;
    }

    let score = normalized_similarity(&a_norm, &b_norm);
    println!("{:?} -> {:?}", args[1], a_norm);
    println!("{:?} -> {:?}", args[2], b_norm);
    println!("score: {:.6}", score);
    println!(
        "match: {} (requires > {})",
        if is_match(score) { "yes" } else { "no" },
        MATCH_THRESHOLD
    );
}
