//! Static registry of supported retailers.

use dealscout_core::ProviderInfo;
use url::form_urlencoded;

use crate::extract::{CardLayout, Strategy};

/// Everything needed to search one retailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retailer {
    pub id: &'static str,
    pub name: &'static str,
    pub base_url: &'static str,
    /// `{query}` is replaced by the form-encoded query.
    pub search_url: &'static str,
    /// Element that signals results have rendered (browser fetcher only).
    pub wait_for_selector: Option<&'static str>,
    /// Overrides the global settle delay.
    pub settle_ms: Option<u64>,
    pub product_paths: &'static [&'static str],
    /// Ranking tiebreak; higher wins.
    pub weight: u32,
    pub strategy: Strategy,
}

impl Retailer {
    pub fn info(&self) -> ProviderInfo {
        ProviderInfo::new(self.id, self.name, self.weight)
    }

    pub fn search_url_for(&self, query: &str, include_auctions: bool) -> String {
        let encoded: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let mut url = self.search_url.replace("{query}", &encoded);
        if self.id == "ebay" && !include_auctions {
            url.push_str("&LH_BIN=1&LH_Auction=0");
        }
        url
    }
}

pub fn find(id: &str) -> Option<&'static Retailer> {
    RETAILERS.iter().find(|r| r.id.eq_ignore_ascii_case(id))
}

const PAWN_AMERICA_CARDS: CardLayout = CardLayout {
    container: ".ps-product",
    title: ".ps-product__title",
    price: ".ps-product__price",
    link: Some(".ps-product__thumbnail a[href]"),
    fallback_links: "a[href]",
};

const NEWEGG_CARDS: CardLayout = CardLayout {
    container: ".item-cell",
    title: "a.item-title",
    price: ".price-current",
    link: None,
    fallback_links: "a[href]",
};

const WALMART_CARDS: CardLayout = CardLayout {
    container: r#"[data-automation-id="product-tile"], [data-item-id], [data-testid="item-stack"]"#,
    title: r#"[data-automation-id="product-title"], [data-testid="product-title"]"#,
    price: r#"[data-automation-id="product-price"], [data-testid="product-price"], span[itemprop="price"]"#,
    link: Some(r#"a[href*="/ip/"]"#),
    fallback_links: r#"a[href*="/ip/"]"#,
};

const BESTBUY_CARDS: CardLayout = CardLayout {
    container: ".sku-item",
    title: ".sku-title a",
    price: ".priceView-hero-price span, .priceView-customer-price span",
    link: None,
    fallback_links: "a[href]",
};

const SLICKDEALS_CARDS: CardLayout = CardLayout {
    container: ".dealCard, .resultRow, .dp-p, .searchResult, [data-threadid], [data-id]",
    title: r#".dealTitle, a[data-did], a[href*="/f/"], a[href*="/deal/"]"#,
    price: ".dealPrice, .price, .dealCard-price, [data-price]",
    link: None,
    fallback_links: r#"a[href*="/f/"], a[href*="/deal/"]"#,
};

pub static RETAILERS: &[Retailer] = &[
    Retailer {
        id: "pawnamerica",
        name: "Pawn America",
        base_url: "https://www.pawnamerica.com",
        search_url: "https://www.pawnamerica.com/Shop?query={query}",
        wait_for_selector: Some(".ps-product__title"),
        settle_ms: Some(2_200),
        product_paths: &[r"/Product/"],
        weight: 50,
        strategy: Strategy::Cards(PAWN_AMERICA_CARDS),
    },
    Retailer {
        id: "ebay",
        name: "eBay",
        base_url: "https://www.ebay.com",
        search_url: "https://www.ebay.com/sch/i.html?_nkw={query}",
        wait_for_selector: None,
        settle_ms: None,
        product_paths: &[r"/itm/"],
        weight: 65,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "newegg",
        name: "Newegg",
        base_url: "https://www.newegg.com",
        search_url: "https://www.newegg.com/p/pl?d={query}",
        wait_for_selector: None,
        settle_ms: None,
        // `/p/pl` is the search page itself.
        product_paths: &[r"/p/(?:[^p]|p[^l])", r"/Product/"],
        weight: 80,
        strategy: Strategy::Cards(NEWEGG_CARDS),
    },
    Retailer {
        id: "slickdeals",
        name: "Slickdeals",
        base_url: "https://slickdeals.net",
        search_url: "https://slickdeals.net/newsearch.php?src=SearchBarV2&q={query}&pp=25",
        wait_for_selector: Some(r#".dealCard, .searchResult, a[href*="/f/"], a[href*="/deal/"]"#),
        settle_ms: Some(2_400),
        product_paths: &[r"/f/", r"/deal/"],
        weight: 55,
        strategy: Strategy::Cards(SLICKDEALS_CARDS),
    },
    Retailer {
        id: "walmart",
        name: "Walmart",
        base_url: "https://www.walmart.com",
        search_url: "https://www.walmart.com/search?q={query}",
        wait_for_selector: Some(r#"[data-automation-id="product-tile"], [data-item-id]"#),
        settle_ms: Some(2_600),
        product_paths: &[r"/ip/"],
        weight: 85,
        strategy: Strategy::Cards(WALMART_CARDS),
    },
    Retailer {
        id: "bestbuy",
        name: "Best Buy",
        base_url: "https://www.bestbuy.com",
        search_url: "https://www.bestbuy.com/site/searchpage.jsp?st={query}",
        wait_for_selector: Some(".sku-item"),
        settle_ms: Some(2_600),
        product_paths: &[r"/site/.+?/\d+\.p"],
        weight: 90,
        strategy: Strategy::Cards(BESTBUY_CARDS),
    },
    Retailer {
        id: "amazon",
        name: "Amazon",
        base_url: "https://www.amazon.com",
        search_url: "https://www.amazon.com/s?k={query}",
        wait_for_selector: None,
        settle_ms: None,
        product_paths: &[r"/dp/", r"/gp/product/"],
        weight: 85,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "target",
        name: "Target",
        base_url: "https://www.target.com",
        search_url: "https://www.target.com/s?searchTerm={query}",
        wait_for_selector: Some(r#"a[href*="/p/"]"#),
        settle_ms: Some(2_600),
        product_paths: &[r"/p/"],
        weight: 80,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "costco",
        name: "Costco",
        base_url: "https://www.costco.com",
        search_url: "https://www.costco.com/CatalogSearch?keyword={query}",
        wait_for_selector: None,
        settle_ms: None,
        product_paths: &[r"/product/"],
        weight: 70,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "samsclub",
        name: "Sam's Club",
        base_url: "https://www.samsclub.com",
        search_url: "https://www.samsclub.com/s/{query}",
        wait_for_selector: None,
        settle_ms: None,
        product_paths: &[r"/p/"],
        weight: 70,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "aliexpress",
        name: "AliExpress",
        base_url: "https://www.aliexpress.us",
        search_url: "https://www.aliexpress.us/w/wholesale-{query}.html",
        wait_for_selector: Some(r#"a[href*="/item/"]"#),
        settle_ms: Some(3_000),
        product_paths: &[r"/item/"],
        weight: 40,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "temu",
        name: "Temu",
        base_url: "https://www.temu.com",
        search_url: "https://www.temu.com/search_result.html?search_key={query}",
        wait_for_selector: Some(r#"a[href*="goods.html"]"#),
        settle_ms: Some(3_000),
        product_paths: &[r"/goods\.html"],
        weight: 35,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "bhphoto",
        name: "B&H Photo",
        base_url: "https://www.bhphotovideo.com",
        search_url: "https://www.bhphotovideo.com/c/search?Ntt={query}",
        wait_for_selector: None,
        settle_ms: None,
        product_paths: &[r"/c/product/"],
        weight: 75,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "microcenter",
        name: "Micro Center",
        base_url: "https://www.microcenter.com",
        search_url: "https://www.microcenter.com/search/search_results.aspx?Ntt={query}",
        wait_for_selector: None,
        settle_ms: None,
        product_paths: &[r"/product/"],
        weight: 75,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "gamestop",
        name: "GameStop",
        base_url: "https://www.gamestop.com",
        search_url: "https://www.gamestop.com/search/?q={query}",
        wait_for_selector: Some(r#"a[href*="/products/"]"#),
        settle_ms: Some(2_600),
        product_paths: &[r"/products/"],
        weight: 70,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "staples",
        name: "Staples",
        base_url: "https://www.staples.com",
        search_url: "https://www.staples.com/search?query={query}",
        wait_for_selector: None,
        settle_ms: None,
        product_paths: &[r"/products/"],
        weight: 60,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "officedepot",
        name: "Office Depot",
        base_url: "https://www.officedepot.com",
        search_url: "https://www.officedepot.com/catalog/search.do?searchTerm={query}",
        wait_for_selector: None,
        settle_ms: None,
        product_paths: &[r"/a/products/"],
        weight: 60,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "dell",
        name: "Dell",
        base_url: "https://www.dell.com",
        search_url: "https://www.dell.com/en-us/search/{query}",
        wait_for_selector: None,
        settle_ms: None,
        product_paths: &[r"/en-us/shop/"],
        weight: 65,
        strategy: Strategy::Generic,
    },
    Retailer {
        id: "lenovo",
        name: "Lenovo",
        base_url: "https://www.lenovo.com",
        search_url: "https://www.lenovo.com/us/en/search?query={query}",
        wait_for_selector: None,
        settle_ms: None,
        product_paths: &[r"/p/"],
        weight: 65,
        strategy: Strategy::Generic,
    },
];
