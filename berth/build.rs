fn main() -> Result<(), shadow_rs::ShadowError> {
    let _shadow = shadow_rs::ShadowBuilder::builder().build()?;
    Ok(())
}
