//! Draft detail → publish request.

use serde_json::{json, Value};

use seller_client::types::{
    BrandLicenseInfo, LogisticsChannel, ModelInfo, PublishDescription, PublishModel, PurchaseLimit,
    SellerStock, SizeChart,
};
use seller_client::{ProductInfo, PublishProductInfo, PublishRequest, SellerDomain};

/// Warehouse the default stock entry is booked against.
pub const DEFAULT_STOCK_LOCATION: &str = "JPZ";

pub fn build_publish_request(info: &ProductInfo, domain: &SellerDomain) -> PublishRequest {
    PublishRequest {
        product_id: info.id,
        product_info: build_product_info(info, domain),
        is_draft: true,
    }
}

fn build_product_info(info: &ProductInfo, domain: &SellerDomain) -> PublishProductInfo {
    let limit = info.max_purchase_limit_info.clone().unwrap_or_default();

    PublishProductInfo {
        name: info.name.clone(),
        enable_model_level_dts: info.enable_model_level_dts.unwrap_or(false),
        category_path: info.category_path.clone(),
        weight: info.weight.clone(),
        condition: info.condition.clone(),
        parent_sku: info.parent_sku.clone().unwrap_or_default(),
        brand_id: info
            .brand_info
            .as_ref()
            .and_then(|b| b.brand_id)
            .unwrap_or(0),
        attributes: info.attributes.clone().unwrap_or_default(),
        images: info.images.clone(),
        long_images: info.long_images.clone().unwrap_or_default(),
        std_tier_variation_list: info
            .std_tier_variation_list
            .clone()
            .filter(|list| !list.is_empty())
            .unwrap_or_else(default_tier_variations),
        size_chart_info: SizeChart {
            size_chart: info
                .size_chart_info
                .as_ref()
                .and_then(|s| s.size_chart.clone())
                .unwrap_or_default(),
        },
        video_list: info.video_list.clone().unwrap_or_default(),
        description_info: PublishDescription {
            description: info
                .description_info
                .as_ref()
                .and_then(|d| d.description.clone())
                .unwrap_or_default(),
            description_type: "normal".to_string(),
        },
        dimension: non_null(&info.dimension)
            .unwrap_or_else(|| json!({"width": "", "length": "", "height": ""})),
        pre_order_info: non_null(&info.pre_order_info)
            .unwrap_or_else(|| json!({"pre_order": true, "days_to_ship": 10})),
        wholesale_list: info.wholesale_list.clone().unwrap_or_default(),
        unlisted: false,
        max_purchase_limit: PurchaseLimit {
            limit_type: nonzero_or(limit.limit_type, 1),
            purchase_limit: nonzero_or(limit.purchase_limit, 1),
        },
        min_purchase_limit: nonzero_or(info.min_purchase_limit, 1),
        logistics_channels: vec![LogisticsChannel {
            size: 0,
            price: domain.shipping_price().to_string(),
            cover_shipping_fee: false,
            enabled: true,
            channelid: domain.logistics_channel_id(),
            sizeid: 0,
        }],
        model_list: build_models(info.model_list.as_deref()),
        authorised_brand_id: info.authorised_brand_id.unwrap_or(0),
        scheduled_publish_time: 0,
        brand_license_info: BrandLicenseInfo::default(),
    }
}

fn default_tier_variations() -> Vec<Value> {
    vec![json!({
        "id": 0,
        "custom_value": "",
        "value_list": [{"id": 0, "custom_value": ""}]
    })]
}

fn default_stock() -> Vec<SellerStock> {
    vec![SellerStock {
        location_id: DEFAULT_STOCK_LOCATION.to_string(),
        sellable_stock: 1,
    }]
}

fn build_models(models: Option<&[ModelInfo]>) -> Vec<PublishModel> {
    match models {
        Some(models) if !models.is_empty() => models.iter().map(build_model).collect(),
        _ => vec![PublishModel {
            id: 0,
            tier_index: vec![0],
            is_default: true,
            price: "0".to_string(),
            stock_setting_list: default_stock(),
        }],
    }
}

fn build_model(model: &ModelInfo) -> PublishModel {
    let stock = model
        .stock_detail
        .as_ref()
        .and_then(|s| s.seller_stock_info.clone())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default_stock);

    PublishModel {
        id: model.id.unwrap_or(0),
        tier_index: model
            .tier_index
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| vec![0]),
        is_default: model.is_default.unwrap_or(true),
        price: model
            .price_info
            .as_ref()
            .and_then(|p| p.input_normal_price.as_ref())
            .and_then(price_string)
            .unwrap_or_else(|| "0".to_string()),
        stock_setting_list: stock,
    }
}

/// Prices arrive as strings or bare numbers; the publish call wants a string.
fn price_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_null(value: &Option<Value>) -> Option<Value> {
    value.clone().filter(|v| !v.is_null())
}

fn nonzero_or(value: Option<i64>, default: i64) -> i64 {
    value.filter(|v| *v != 0).unwrap_or(default)
}
