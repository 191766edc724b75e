//! # Tuple Signing and Verification
//!
//! New signatures always use the latest form and the current key.
//! Verification accepts any declared form under any configured key, so
//! rows survive both schema evolution and key rotation until they are
//! rolled.

use rowseal_crypto::{Signature, Signer};

use crate::descriptor::EntityDescriptor;
use crate::error::MapperError;
use crate::form::preimage;
use crate::tuple::{Authenticity, Payload, SignatureMatch, Tuple};

/// Sign a stored payload with the latest form and current key.
pub(crate) fn sign_payload(
    descriptor: &EntityDescriptor,
    payload: &Payload,
    signer: &Signer,
) -> Result<(Signature, SignatureMatch), MapperError> {
    let form = descriptor
        .latest_form()
        .ok_or_else(|| MapperError::NotSigned(descriptor.name().clone()))?;
    let data = preimage(descriptor, form, payload)?;
    let signature = signer.sign(&data).map_err(|e| {
        tracing::debug!(entity = %descriptor.name(), error = %e, "signing failed");
        MapperError::Crypto {
            entity: descriptor.name().clone(),
            operation: "sign",
        }
    })?;
    let matched = SignatureMatch {
        form: form.id().clone(),
        form_index: 0,
        key: signature.key,
    };
    Ok((signature, matched))
}

/// Establish the authenticity of a stored tuple.
///
/// Forms are tried newest first and, for each, keys current first. A form
/// that cannot render the payload (a field tampered into the wrong type)
/// simply does not match.
pub fn verify_tuple(descriptor: &EntityDescriptor, tuple: &Tuple, signer: Option<&Signer>) -> Authenticity {
    if !descriptor.is_signed() {
        return Authenticity::Unsigned;
    }
    let (Some(signer), Some(signature)) = (signer, tuple.signature.as_deref()) else {
        return Authenticity::Failed;
    };
    for (form_index, form) in descriptor.forms().iter().enumerate() {
        let data = match preimage(descriptor, form, &tuple.payload) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(entity = %descriptor.name(), key = %tuple.pk, form = form.id().short(), error = %e, "form does not render");
                continue;
            }
        };
        if let Some(key) = signer.verify(&data, signature) {
            return Authenticity::Verified(SignatureMatch {
                form: form.id().clone(),
                form_index,
                key,
            });
        }
    }
    Authenticity::Failed
}
