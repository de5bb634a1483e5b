use crate::{
    entity::{expect_str, put, put_extras, Entity, RawMapping},
    error::{Error, Result},
};

/// Software image reference shared by the units of one descriptor.
#[derive(Clone, Debug, Default)]
pub struct ImageDescriptor {
    id: String,
    name: String,
    image: String,
    vim_type: Option<String>,
    extra: RawMapping,
    configured: bool,
}

impl ImageDescriptor {
    pub fn configure(
        &mut self,
        id: &str,
        image: &str,
        name: Option<&str>,
        vim_type: Option<&str>,
    ) -> Result<()> {
        self.guard_unconfigured()?;
        if id.is_empty() || image.is_empty() {
            return Err(Error::Validation(
                "the image id and the image reference must not be empty".into(),
            ));
        }

        self.id = id.into();
        self.image = image.into();
        self.name = name.unwrap_or(id).into();
        self.vim_type = vim_type.map(Into::into);
        self.configured = true;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn vim_type(&self) -> Option<&str> {
        self.vim_type.as_deref()
    }
}

impl Entity for ImageDescriptor {
    const KIND: &'static str = "image descriptor";

    fn key(&self) -> &str {
        &self.id
    }

    fn configured(&self) -> bool {
        self.configured
    }

    fn load(&mut self, raw: &RawMapping) -> Result<()> {
        self.guard_unconfigured()?;

        for (key, value) in raw {
            match key.as_str() {
                Some("id") => self.id = expect_str("id", value)?,
                Some("name") => self.name = expect_str("name", value)?,
                Some("image") => self.image = expect_str("image", value)?,
                Some("vim-type") => self.vim_type = Some(expect_str("vim-type", value)?),
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }

        if self.id.is_empty() {
            return Err(Error::Validation("the image id must not be empty".into()));
        }
        if self.name.is_empty() {
            self.name = self.id.clone();
        }
        self.configured = true;
        Ok(())
    }

    fn to_mapping(&self) -> RawMapping {
        let mut map = RawMapping::new();
        put(&mut map, "id", self.id.as_str());
        put(&mut map, "name", self.name.as_str());
        put(&mut map, "image", self.image.as_str());
        if let Some(vim_type) = &self.vim_type {
            put(&mut map, "vim-type", vim_type.as_str());
        }
        put_extras(&mut map, &self.extra);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_defaults_to_id() {
        let mut image = ImageDescriptor::default();
        image
            .configure("ubuntu20.04", "./iso/ubuntu20.04", None, None)
            .unwrap();

        assert_eq!(image.name(), "ubuntu20.04");
        assert_eq!(image.vim_type(), None);
    }

    #[test]
    fn round_trip_with_vim_type() {
        let mut image = ImageDescriptor::default();
        image
            .configure("ubuntu20.04", "./iso/ubuntu20.04", Some("base"), Some("openstack"))
            .unwrap();

        let exported = image.to_mapping();
        let mut reloaded = ImageDescriptor::default();
        reloaded.load(&exported).unwrap();
        assert_eq!(reloaded.to_mapping(), exported);
    }

    #[test]
    fn empty_image_reference_is_rejected() {
        let mut image = ImageDescriptor::default();
        assert!(matches!(
            image.configure("ubuntu20.04", "", None, None),
            Err(Error::Validation(_)),
        ));
    }
}
