use listing_scraper::config::SiteProfile;
use listing_scraper::pipeline::ListingPipeline;
use listing_scraper::series::SeriesClassifier;
use std::collections::HashSet;

const SOURCE: &str = "https://www.ebay.com/sch/i.html?_nkw=nike";
const SEARCH_PAGE: &str = include_str!("fixtures/search_page.html");

fn pipeline() -> ListingPipeline {
    ListingPipeline::new(&SiteProfile::ebay())
}

#[test]
fn test_search_page_fixture() {
    let result = pipeline().run(SEARCH_PAGE, 1, SOURCE);

    let names: Vec<&str> = result.products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Nike Air Max 90 Essential White Black",
            "Nike Blazer Mid '77 Vintage",
            "nike react element 55 trainers size 9 uk",
        ]
    );

    let air_max = &result.products[0];
    assert_eq!(air_max.price, "$74.99");
    assert_eq!(air_max.shipping, "+$12.45 shipping");
    assert_eq!(air_max.condition, "Pre-Owned");
    assert_eq!(air_max.location, "from Canada");
    assert_eq!(air_max.series, "Air Max 90");

    let blazer = &result.products[1];
    assert_eq!(blazer.price, "$62.00 to $80.00");
    assert_eq!(blazer.condition, "Brand New");
    assert_eq!(blazer.shipping, "-");
    assert_eq!(blazer.series, "Blazer");

    let react = &result.products[2];
    assert_eq!(react.price, "$48.50");
    assert_eq!(react.shipping, "Free shipping");
    assert_eq!(react.location, "-");
    assert_eq!(react.series, "React Element");

    assert_eq!(result.current_page, 1);
    assert!(result.has_next_page);
    assert_eq!(
        result.next_page_url.as_deref(),
        Some("https://www.ebay.com/sch/i.html?_nkw=nike&_pgn=2")
    );
}

#[test]
fn test_result_invariants_hold_for_assorted_inputs() {
    let many: String = (0..80)
        .map(|i| {
            format!(
                r#"<li class="s-item"><h3>Nike Zoom Vomero {}</h3><span class="s-item__price">${}.00</span></li>"#,
                i % 30,
                i % 7
            )
        })
        .collect();
    let inputs = vec![
        String::new(),
        "<html><body><p>captcha</p></body></html>".to_string(),
        SEARCH_PAGE.to_string(),
        format!(r#"<ul class="srp-results">{}</ul>"#, many),
        r#"<ul class="srp-results"><li class="s-item"><h3>Nike</h3>$5</li></ul>"#.to_string(),
    ];

    for html in &inputs {
        for page in [1, 2, 7] {
            let result = pipeline().run(html, page, SOURCE);

            assert!(result.products.len() <= 50);
            assert_eq!(result.has_next_page, result.next_page_url.is_some());

            let mut keys = HashSet::new();
            for product in &result.products {
                assert!(product.name.chars().count() > 5, "short name {:?}", product.name);
                assert_ne!(product.name, "-");
                assert_ne!(product.price, "-");
                assert!(keys.insert((product.name.clone(), product.price.clone())));
            }
        }
    }
}

#[test]
fn test_next_page_url_for_page_two() {
    let html = r##"<ul class="srp-results"></ul><a class="ebayui-pagination__control--next" href="#">next</a>"##;
    let result = pipeline().run(html, 2, SOURCE);
    assert!(result.products.is_empty());
    assert_eq!(
        result.next_page_url.as_deref(),
        Some("https://www.ebay.com/sch/i.html?_nkw=nike&_pgn=3")
    );
}

#[test]
fn test_degraded_result_page_limit() {
    let p = pipeline();
    for page in 1..=4 {
        let result = p.degraded(page, SOURCE);
        assert_eq!(result.products, vec![SiteProfile::ebay().mock_product]);
        assert_eq!(result.has_next_page, page < 3);
        assert_eq!(result.has_next_page, result.next_page_url.is_some());
    }
}

#[test]
fn test_classifier_examples() {
    let classifier = SeriesClassifier::new(SiteProfile::ebay().series);
    assert_eq!(classifier.classify("Nike Air Max 90 Essential"), "Air Max 90");
    assert_eq!(classifier.classify("Unbranded Item"), "-");
}
