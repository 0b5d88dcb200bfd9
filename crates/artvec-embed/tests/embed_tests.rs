use artvec_core::config::ModelSettings;
use artvec_core::traits::Embedder;
use artvec_embed::{get_default_embedder, FakeEmbedder};
use image::{DynamicImage, Rgb, RgbImage};

fn norm(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

#[test]
fn fake_embedder_text_shapes_and_determinism() {
    // Force fake embedder to avoid loading model weights
    let settings = ModelSettings { use_fake: true, fake_dim: 512, ..ModelSettings::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    let texts = vec!["a windmill at dusk".to_string(), "a windmill at dusk".to_string()];
    let embs = Embedder::<String>::embed_batch(embedder.as_ref(), &texts).expect("embed_batch");

    assert_eq!(embs.len(), 2);
    assert_eq!(embs[0].len(), 512, "embedding dim is 512");
    assert!((norm(&embs[0]) - 1.0).abs() <= 1e-3, "vector is L2-normalized");
    for (a, b) in embs[0].iter().zip(embs[1].iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn fake_embedder_images_are_normalized_and_distinct() {
    let embedder = FakeEmbedder::new(64);
    let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([220, 10, 10])));
    let blue = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([10, 10, 220])));
    let embs = Embedder::<DynamicImage>::embed_batch(&embedder, &[red.clone(), blue, red]).expect("embed");

    assert_eq!(embs.len(), 3, "one vector per input");
    assert_eq!(Embedder::<DynamicImage>::dim(&embedder), 64);
    for v in &embs { assert!((norm(v) - 1.0).abs() <= 1e-3); }
    assert_eq!(embs[0], embs[2], "same image, same vector");
    assert_ne!(embs[0], embs[1], "different images, different vectors");
}

#[test]
fn empty_batch_gives_empty_output() {
    let embedder = FakeEmbedder::new(16);
    let out = Embedder::<DynamicImage>::embed_batch(&embedder, &[]).expect("embed");
    assert!(out.is_empty());
}

#[test]
fn embedding_dim_follows_selected_embedder() {
    let fake = ModelSettings { use_fake: true, fake_dim: 48, ..ModelSettings::default() };
    assert_eq!(artvec_embed::embedding_dim(&fake), 48);
    if std::env::var("APP_USE_FAKE_EMBEDDINGS").is_err() {
        assert_eq!(artvec_embed::embedding_dim(&ModelSettings::default()), artvec_embed::CLIP_DIM);
    }
}
