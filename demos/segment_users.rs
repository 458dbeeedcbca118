//! Segment a synthetic population and print each segment.
//!
//! ```sh
//! RUST_LOG=cohort=debug cargo run --example segment_users
//! ```

use cohort::{RawUserBehavior, SegmentationConfig, SegmentationEngine};
use rand::prelude::*;
use tracing_subscriber::EnvFilter;

fn binger(rng: &mut StdRng, id: String) -> RawUserBehavior {
    RawUserBehavior {
        completion_rate: rng.random_range(0.8..1.0),
        binge_tendency: rng.random_range(0.7..1.0),
        viewing_consistency: rng.random_range(0.6..0.9),
        watchlist_size: rng.random_range(20.0..60.0),
        watchlist_completion: rng.random_range(0.5..0.9),
        ..RawUserBehavior::new(id)
    }
}

fn searcher(rng: &mut StdRng, id: String) -> RawUserBehavior {
    RawUserBehavior {
        search_frequency: rng.random_range(0.7..1.0),
        search_complexity: rng.random_range(0.5..0.9),
        search_success_rate: rng.random_range(0.3..0.7),
        exploration_depth: rng.random_range(0.6..1.0),
        hover_rate: rng.random_range(0.4..0.8),
        content_diversity: rng.random_range(0.5..0.9),
        ..RawUserBehavior::new(id)
    }
}

fn critic(rng: &mut StdRng, id: String) -> RawUserBehavior {
    RawUserBehavior {
        rating_count: rng.random_range(20.0..80.0),
        rating_variance: rng.random_range(1.0..3.0),
        average_rating: rng.random_range(2.5..4.5),
        average_review_length: rng.random_range(100.0..400.0),
        completion_rate: rng.random_range(0.4..0.7),
        ..RawUserBehavior::new(id)
    }
}

fn main() -> cohort::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut rng = StdRng::seed_from_u64(7);
    let makers: [fn(&mut StdRng, String) -> RawUserBehavior; 3] = [binger, searcher, critic];
    let users: Vec<RawUserBehavior> = (0..90)
        .map(|i| makers[i % 3](&mut rng, format!("user-{i:03}")))
        .collect();

    let mut engine = SegmentationEngine::new(SegmentationConfig::default());
    let result = engine.segment(&users)?;

    let q = &result.metadata.quality;
    println!(
        "{} users -> {} segments ({} linkage, {} metric)",
        result.metadata.n_users, result.metadata.n_clusters, result.metadata.linkage, result.metadata.metric
    );
    println!(
        "silhouette {:.3} ({}), davies-bouldin {:.3}, calinski-harabasz {:.1}",
        q.silhouette, q.tier, q.davies_bouldin, q.calinski_harabasz
    );
    if let Some(info) = &result.metadata.optimization {
        if info.optimized {
            println!("optimized: {:?} -> {:?}", info.original, info.chosen);
        } else {
            println!("kept first pass after {} alternatives", info.candidates_tried);
        }
    }

    for cluster in &result.clusters {
        let ch = &cluster.characteristics;
        println!(
            "\nsegment {} ({} users): {} / {} engagement -> {}",
            cluster.id, cluster.size, ch.archetype, ch.engagement_level, ch.recommendation_strategy
        );
        for f in &ch.dominant_features {
            println!("  {:<22} {:.2}", f.feature.name(), f.value);
        }
        if !ch.content_preferences.is_empty() {
            println!("  preferences: {}", ch.content_preferences.join(", "));
        }
        if !ch.behavior_patterns.is_empty() {
            println!("  patterns:    {}", ch.behavior_patterns.join(", "));
        }
    }

    let profile = engine.profile("user-000");
    println!(
        "\nuser-000: segment {:?}, strategy {}, {} peers",
        profile.cluster_id,
        profile.strategy,
        profile.peers.len()
    );
    Ok(())
}
