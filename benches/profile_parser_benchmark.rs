//! Profile extraction throughput
//!
//! Parsing runs inside every player task, so a slow parser directly
//! stretches the processing phase.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use player_census::infrastructure::parsing::ProfileParser;

fn profile_page(cards: usize) -> String {
    let rp_cards: String = (0..cards)
        .map(|i| format!("<div class=\"rp-card\"><h3>Card {i}</h3><p>Story   number {i} .</p></div>"))
        .collect();
    format!(
        r#"<html><body>
            <div class="playerOnline active"></div>
            <p class="status-main"><span class="material-symbols-rounded">star</span> Mayor of Town</p>
            <div class="player-plus-content"><p>Premium</p></div>
            <div class="socials">
                <a href="https://vk.com/steve">VK</a>
                <a class="social telegram" href="https://t.me/steve">Telegram</a>
            </div>
            <div class="stats"><p>Hours played : 120</p><p>Deaths: 4</p><p>Blocks: 9000</p></div>
            <div class="rp-container">{rp_cards}</div>
            <div class="roles"><span>Builder</span><span>Judge</span></div>
        </body></html>"#
    )
}

fn bench_parse(c: &mut Criterion) {
    let parser = ProfileParser::new().expect("selectors compile");
    let small = profile_page(2);
    let large = profile_page(200);

    c.bench_function("parse_profile_small", |b| {
        b.iter(|| parser.parse(black_box(&small)));
    });
    c.bench_function("parse_profile_large", |b| {
        b.iter(|| parser.parse(black_box(&large)));
    });
    c.bench_function("extract_contact_link", |b| {
        b.iter(|| parser.extract_contact_link(black_box(&small)));
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
