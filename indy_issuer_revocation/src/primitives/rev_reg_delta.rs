#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevocationRegistryDelta {
    pub value: RevocationRegistryDeltaValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRegistryDeltaValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_accum: Option<String>,
    pub accum: String,
    #[serde(default)]
    pub issued: Vec<u32>,
    #[serde(default)]
    pub revoked: Vec<u32>,
}

impl RevocationRegistryDelta {
    pub fn accum(&self) -> &str {
        &self.value.accum
    }

    pub fn revoked(&self) -> &[u32] {
        &self.value.revoked
    }
}
