use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SellerError};

// --- Response envelope ---

/// Every seller-centre endpoint answers with `{code, data, message?}`.
/// `code != 0` is an application failure; this layer does not treat it as
/// an error, callers decide via [`ApiEnvelope::into_data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub code: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            code: 0,
            data,
            message: None,
            msg: None,
            error: None,
        }
    }

    pub fn failure(code: i64, message: &str) -> Self {
        Self {
            code,
            data: Value::Null,
            message: Some(message.to_string()),
            msg: None,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Best human-readable explanation the envelope carries.
    pub fn describe(&self) -> String {
        [&self.message, &self.msg, &self.error]
            .into_iter()
            .flatten()
            .find(|m| !m.is_empty())
            .cloned()
            .unwrap_or_else(|| serde_json::to_string(self).unwrap_or_default())
    }

    /// Turn the envelope into a typed payload, mapping `code != 0` to
    /// [`SellerError::Application`].
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        if !self.is_ok() {
            return Err(SellerError::Application {
                code: self.code,
                message: self.describe(),
            });
        }
        if self.data.is_null() {
            return Err(SellerError::MalformedResponse(
                "response envelope has no data".to_string(),
            ));
        }
        Ok(serde_json::from_value(self.data)?)
    }
}

// --- Draft listing ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPage {
    #[serde(default)]
    pub products: Vec<DraftProduct>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftProduct {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    pub total: u64,
    pub page_size: u32,
    #[serde(default)]
    pub page_number: u32,
}

// --- Content quality ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityInfo {
    /// Keyed by product id rendered as a string.
    #[serde(default)]
    pub content_quality_info: HashMap<String, QualityEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityEntry {
    #[serde(default)]
    pub quality_level: Option<i64>,
}

impl QualityInfo {
    pub fn level_of(&self, product_id: u64) -> Option<i64> {
        self.content_quality_info
            .get(&product_id.to_string())
            .and_then(|entry| entry.quality_level)
    }
}

// --- Product detail ---

#[derive(Debug, Clone, Deserialize)]
pub struct ProductDetail {
    pub product_info: ProductInfo,
}

/// Draft product as the detail endpoint returns it. Only the fields the
/// publish payload reads are typed; opaque structures stay as JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductInfo {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub enable_model_level_dts: Option<bool>,
    pub category_path: Option<Vec<u64>>,
    pub weight: Option<Value>,
    pub condition: Option<Value>,
    pub parent_sku: Option<String>,
    pub brand_info: Option<BrandInfo>,
    pub attributes: Option<Vec<Value>>,
    pub images: Option<Vec<Value>>,
    pub long_images: Option<Vec<Value>>,
    pub std_tier_variation_list: Option<Vec<Value>>,
    pub size_chart_info: Option<SizeChartInfo>,
    pub video_list: Option<Vec<Value>>,
    pub description_info: Option<DescriptionInfo>,
    pub dimension: Option<Value>,
    pub pre_order_info: Option<Value>,
    pub wholesale_list: Option<Vec<Value>>,
    pub max_purchase_limit_info: Option<PurchaseLimitInfo>,
    pub min_purchase_limit: Option<i64>,
    pub model_list: Option<Vec<ModelInfo>>,
    pub authorised_brand_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandInfo {
    pub brand_id: Option<u64>,
    pub brand_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SizeChartInfo {
    pub size_chart: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriptionInfo {
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseLimitInfo {
    #[serde(rename = "type")]
    pub limit_type: Option<i64>,
    pub purchase_limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelInfo {
    pub id: Option<u64>,
    pub tier_index: Option<Vec<u32>>,
    pub is_default: Option<bool>,
    pub price_info: Option<PriceInfo>,
    pub stock_detail: Option<StockDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceInfo {
    /// Either a decimal string or a bare number depending on market.
    pub input_normal_price: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockDetail {
    pub seller_stock_info: Option<Vec<SellerStock>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerStock {
    pub location_id: String,
    pub sellable_stock: i64,
}

// --- Publish request ---

#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest {
    pub product_id: u64,
    pub product_info: PublishProductInfo,
    pub is_draft: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishProductInfo {
    pub name: String,
    pub enable_model_level_dts: bool,
    pub category_path: Option<Vec<u64>>,
    pub weight: Option<Value>,
    pub condition: Option<Value>,
    pub parent_sku: String,
    pub brand_id: u64,
    pub attributes: Vec<Value>,
    pub images: Option<Vec<Value>>,
    pub long_images: Vec<Value>,
    pub std_tier_variation_list: Vec<Value>,
    pub size_chart_info: SizeChart,
    pub video_list: Vec<Value>,
    pub description_info: PublishDescription,
    pub dimension: Value,
    pub pre_order_info: Value,
    pub wholesale_list: Vec<Value>,
    pub unlisted: bool,
    pub max_purchase_limit: PurchaseLimit,
    pub min_purchase_limit: i64,
    pub logistics_channels: Vec<LogisticsChannel>,
    pub model_list: Vec<PublishModel>,
    pub authorised_brand_id: u64,
    pub scheduled_publish_time: i64,
    pub brand_license_info: BrandLicenseInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SizeChart {
    pub size_chart: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishDescription {
    pub description: String,
    pub description_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseLimit {
    #[serde(rename = "type")]
    pub limit_type: i64,
    pub purchase_limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogisticsChannel {
    pub size: u32,
    pub price: String,
    pub cover_shipping_fee: bool,
    pub enabled: bool,
    pub channelid: u64,
    pub sizeid: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishModel {
    pub id: u64,
    pub tier_index: Vec<u32>,
    pub is_default: bool,
    pub price: String,
    pub stock_setting_list: Vec<SellerStock>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BrandLicenseInfo {
    pub license_id_list: Vec<u64>,
}

// --- Usage metrics ---

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub metrics: Vec<MetricsEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsEntry {
    pub product_id: u64,
    pub report_module: String,
    pub event_duration: u64,
    pub success_count: u32,
    pub total_count: u32,
    /// JSON document serialized to a string, as the endpoint expects.
    pub payload: String,
    pub event_operation: u32,
}

// --- Deletion ---

#[derive(Debug, Clone, Serialize)]
pub struct DeleteRequest {
    pub unpublished_ids: Vec<u64>,
}
